//! HTTP/2 SETTINGS sent on upstream connections.
//!
//! Origins fingerprint the SETTINGS frame alongside the TLS hello, so the
//! upstream HTTP/2 client announces browser-like values rather than library
//! defaults.

/// SETTINGS values for the upstream HTTP/2 connection.
#[derive(Debug, Clone, Copy)]
pub struct H2Settings {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1)
    pub header_table_size: u32,
    /// SETTINGS_ENABLE_PUSH (0x2)
    pub enable_push: bool,
    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4)
    pub initial_window_size: u32,
    /// SETTINGS_MAX_FRAME_SIZE (0x5)
    pub max_frame_size: u32,
    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6)
    pub max_header_list_size: u32,
}

impl Default for H2Settings {
    fn default() -> Self {
        Self::chrome()
    }
}

impl H2Settings {
    /// Chrome-like SETTINGS.
    pub fn chrome() -> Self {
        Self {
            header_table_size: 65536,
            enable_push: false,
            initial_window_size: 6_291_456,
            max_frame_size: 16_384,
            max_header_list_size: 262_144,
        }
    }

    /// Apply to an `h2` client builder.
    pub fn apply(&self, builder: &mut h2::client::Builder) {
        builder
            .header_table_size(self.header_table_size)
            .enable_push(self.enable_push)
            .initial_window_size(self.initial_window_size)
            .max_frame_size(self.max_frame_size)
            .max_header_list_size(self.max_header_list_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_chrome() {
        let settings = H2Settings::default();
        assert_eq!(settings.initial_window_size, 6_291_456);
        assert!(!settings.enable_push);
        assert_eq!(settings.max_frame_size, 16_384);
    }
}
