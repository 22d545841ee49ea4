use serde_json::Value;

/// Properties handed to a component, as a JSON object.
///
/// Resolved dependency data is written into the same map under the
/// dependency's name, so components read fetched values exactly like any
/// other prop.
pub type Props = serde_json::Map<String, Value>;

/// Convenience accessors for reading props inside `render`.
pub trait PropsExt {
    /// Reads a prop as display text. Strings are returned verbatim, `null`
    /// and missing props become an empty string, anything else is rendered
    /// as compact JSON.
    fn text(&self, key: &str) -> String;
}

impl PropsExt for Props {
    fn text(&self, key: &str) -> String {
        match self.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// A 32-byte BLAKE3 hash.
///
/// Node identities are derived from it, so two render passes (or a server
/// and a client render) that see the same structural path agree on the key
/// under which the node's data is stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for byte in self.0 {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}
