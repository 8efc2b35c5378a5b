//! Derivation paths such as `m/44'/0'/0'/0/1`.

use std::fmt;
use std::str::FromStr;

use crate::types::{is_hardened, HARDENED_BIT};
use crate::KeyError;

/// A sequence of child indexes, applied from the root outwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// The empty path, i.e. the master node.
    pub fn master() -> Self {
        Self::default()
    }

    /// Extend the path by one step.
    pub fn child(mut self, index: u32) -> Self {
        self.0.push(index);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for DerivationPath {
    fn from(indexes: Vec<u32>) -> Self {
        Self(indexes)
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = KeyError;

    /// Parse `m` followed by `/`-separated indexes. A trailing `'`, `h` or
    /// `H` marks a hardened step.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(KeyError::InvalidPath(format!("{s:?} does not start at m")));
        }

        parts
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                let index: u32 = digits
                    .parse()
                    .map_err(|_| KeyError::InvalidPath(format!("bad index {part:?}")))?;
                if is_hardened(index) {
                    return Err(KeyError::InvalidPath(format!(
                        "index {index} out of range"
                    )));
                }
                Ok(if hardened { index | HARDENED_BIT } else { index })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            if is_hardened(*index) {
                write!(f, "/{}'", index & !HARDENED_BIT)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_path() {
        let path: DerivationPath = "m/44'/0h/0H/1/23".parse().unwrap();
        assert_eq!(
            path.as_ref(),
            &[0x8000_002c, 0x8000_0000, 0x8000_0000, 1, 23]
        );
        assert_eq!(path.to_string(), "m/44'/0'/0'/1/23");
    }

    #[test]
    fn test_parse_master() {
        let path: DerivationPath = "m".parse().unwrap();
        assert!(path.is_empty());
        assert_eq!(path, DerivationPath::master());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "44/0", "m/", "m/x", "m/2147483648", "m/1''", "M/1"] {
            assert!(
                matches!(bad.parse::<DerivationPath>(), Err(KeyError::InvalidPath(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_builder() {
        let path = DerivationPath::master().child(HARDENED_BIT).child(5);
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "m/0'/5");
    }
}
