use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

pub const FLAG_ACK: u8 = 0x1;

const SETTING_ENTRY_LEN: usize = 6;

/// One SETTINGS parameter identifier (RFC 7540 §6.5.2). Unrecognized
/// identifiers are kept as `Unknown` and ignored by the receiver, never
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    Unknown(u16),
}

impl SettingId {
    fn from_u16(id: u16) -> SettingId {
        match id {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            other => SettingId::Unknown(other),
        }
    }

    fn to_u16(self) -> u16 {
        match self {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::Unknown(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

/// SETTINGS frame (RFC 7540 §6.5). Always stream id 0; an ACK frame carries
/// no parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ack: bool,
    pub params: Vec<Setting>,
}

impl Settings {
    pub fn ack() -> Settings {
        Settings {
            ack: true,
            params: Vec::new(),
        }
    }

    pub fn new(params: Vec<Setting>) -> Settings {
        Settings { ack: false, params }
    }

    pub fn parse(header: FrameHeader, payload: &[u8]) -> Result<Settings, FrameError> {
        if header.stream_id != 0 {
            return Err(protocol_error());
        }
        let ack = header.flags & FLAG_ACK != 0;
        if ack {
            if header.length != 0 {
                return Err(frame_size_error());
            }
            return Ok(Settings::ack());
        }
        if payload.len() % SETTING_ENTRY_LEN != 0 {
            return Err(frame_size_error());
        }

        let mut params = Vec::with_capacity(payload.len() / SETTING_ENTRY_LEN);
        for chunk in payload.chunks_exact(SETTING_ENTRY_LEN) {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
            params.push(Setting {
                id: SettingId::from_u16(id),
                value,
            });
        }
        Ok(Settings::new(params))
    }

    pub fn flags(&self) -> u8 {
        if self.ack {
            FLAG_ACK
        } else {
            0
        }
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        for setting in &self.params {
            out.extend_from_slice(&setting.id.to_u16().to_be_bytes());
            out.extend_from_slice(&setting.value.to_be_bytes());
        }
    }
}
