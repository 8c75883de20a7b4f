#![forbid(unsafe_code)]

/// How freshly generated payload bodies are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSettings {
    /// Compress bitmap and data bodies with zstd.
    pub compress: bool,
    /// 1..=22, only used when `compress` is set.
    pub zstd_level: i32,
}

impl CodecSettings {
    pub const DEFAULT_ZSTD_LEVEL: i32 = 6;

    pub fn uncompressed() -> Self {
        Self {
            compress: false,
            zstd_level: 0,
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.zstd_level = level.clamp(1, 22);
        self
    }
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            compress: cfg!(feature = "zstd"),
            zstd_level: Self::DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// Settings for one patch-rewrite transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditSettings {
    pub codec: CodecSettings,
    /// Rewrite the whole file instead of appending changed payloads.
    pub compact: bool,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            codec: CodecSettings::default(),
            compact: true,
        }
    }
}
