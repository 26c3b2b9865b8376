use serde::{Serialize, Deserialize};
use tracing::warn;

/// Text encodings the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Default,
    None,
    EucJp,
    Utf8,
    Latin1,
    Koi8r,
}

impl Encoding {
    /// Maps a host server encoding name onto the engine encoding.
    pub fn from_host(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "EUC_JP" | "EUC_JIS_2004" => Encoding::EucJp,
            "UTF8" | "UTF-8" => Encoding::Utf8,
            "LATIN1" => Encoding::Latin1,
            "KOI8R" | "KOI8-R" => Encoding::Koi8r,
            "SQL_ASCII" => Encoding::None,
            other => {
                warn!(encoding = other, "use default encoding instead of host encoding");
                Encoding::Default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_encodings() {
        assert_eq!(Encoding::from_host("UTF8"), Encoding::Utf8);
        assert_eq!(Encoding::from_host("euc_jis_2004"), Encoding::EucJp);
        assert_eq!(Encoding::from_host("WIN1252"), Encoding::Default);
    }
}
