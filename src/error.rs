use thiserror::Error;

/// Errors which abort a render. A failing dependency source is not one of
/// them: it settles as a failed [`Record`](crate::Record) and the render
/// carries on.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Component '{component}' failed to declare its dependencies:\n{source}")]
    Extraction {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component '{component}' failed to render:\n{source}")]
    Render {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Couldn't serialize the data packet.\n{0}")]
    Packet(#[from] serde_json::Error),

    #[cfg(feature = "tokio")]
    #[error("Failed to build runtime")]
    RuntimeBuild(#[from] std::io::Error),
}

impl RenderError {
    pub(crate) fn extraction(component: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Extraction {
            component: component.into(),
            source,
        }
    }

    pub(crate) fn render(component: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Render {
            component: component.into(),
            source,
        }
    }
}
