//! Negotiated connection settings (spec §4.8 "Settings").

use crate::h2::error::Reason;
use crate::h2::flow_control::DEFAULT_INITIAL_WINDOW_SIZE;
use crate::h2::frame::{Setting, SettingId, MAX_MAX_FRAME_SIZE, MIN_MAX_FRAME_SIZE};
use crate::hpack::DEFAULT_TABLE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsError(pub Reason);

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid settings: {}", self.0)
    }
}

impl std::error::Error for SettingsError {}

/// One side's negotiated parameter set, seeded with the RFC 7540 §6.5.2
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: i32,
    pub max_frame_size: u32,
    pub max_header_list_size: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            header_table_size: DEFAULT_TABLE_SIZE as u32,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: MIN_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}

impl Settings {
    /// Applies a peer SETTINGS frame's parameters, validating
    /// SETTINGS_MAX_FRAME_SIZE's range and SETTINGS_ENABLE_PUSH's domain.
    /// Returns the initial-window-size delta (new - old) so the caller can
    /// propagate it to every open stream per spec §4.5.
    pub fn apply(&mut self, params: &[Setting]) -> Result<i64, SettingsError> {
        let mut window_delta = 0i64;
        for setting in params {
            match setting.id {
                SettingId::HeaderTableSize => self.header_table_size = setting.value,
                SettingId::EnablePush => match setting.value {
                    0 => self.enable_push = false,
                    1 => self.enable_push = true,
                    _ => return Err(SettingsError(Reason::PROTOCOL_ERROR)),
                },
                SettingId::MaxConcurrentStreams => {
                    self.max_concurrent_streams = Some(setting.value)
                }
                SettingId::InitialWindowSize => {
                    if setting.value > crate::h2::flow_control::MAX_WINDOW_SIZE as u32 {
                        return Err(SettingsError(Reason::FLOW_CONTROL_ERROR));
                    }
                    let new_value = setting.value as i32;
                    window_delta += (new_value - self.initial_window_size) as i64;
                    self.initial_window_size = new_value;
                }
                SettingId::MaxFrameSize => {
                    if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&setting.value) {
                        return Err(SettingsError(Reason::PROTOCOL_ERROR));
                    }
                    self.max_frame_size = setting.value;
                }
                SettingId::MaxHeaderListSize => {
                    self.max_header_list_size = Some(setting.value)
                }
                SettingId::Unknown(_) => {}
            }
        }
        Ok(window_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc() {
        let s = Settings::default();
        assert_eq!(s.initial_window_size, 65_535);
        assert_eq!(s.max_frame_size, 16_384);
        assert!(s.enable_push);
    }

    #[test]
    fn apply_returns_window_delta() {
        let mut s = Settings::default();
        let delta = s
            .apply(&[Setting {
                id: SettingId::InitialWindowSize,
                value: 100,
            }])
            .unwrap();
        assert_eq!(delta, 100 - 65_535);
        assert_eq!(s.initial_window_size, 100);
    }

    #[test]
    fn apply_rejects_max_frame_size_out_of_range() {
        let mut s = Settings::default();
        let result = s.apply(&[Setting {
            id: SettingId::MaxFrameSize,
            value: 10,
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn apply_ignores_unknown_identifiers() {
        let mut s = Settings::default();
        s.apply(&[Setting {
            id: SettingId::Unknown(99),
            value: 7,
        }])
        .unwrap();
        assert_eq!(s, Settings::default());
    }
}
