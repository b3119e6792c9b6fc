//! Address book data types: connection profiles, groups, and the
//! per-session desktop configuration each profile carries.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default port of the remote host agent.
pub const DEFAULT_HOST_PORT: u16 = 8050;

/// Current time as seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

// ─── Session Kinds ──────────────────────────────────────────────────

/// Session kind a profile opens by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    DesktopManage = 1,
    DesktopView = 2,
    FileTransfer = 4,
    SystemInfo = 8,
    PowerManage = 16,
}

impl Default for SessionType {
    fn default() -> Self { Self::DesktopManage }
}

impl SessionType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::DesktopManage),
            2 => Some(Self::DesktopView),
            4 => Some(Self::FileTransfer),
            8 => Some(Self::SystemInfo),
            16 => Some(Self::PowerManage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DesktopManage => "Desktop Manage",
            Self::DesktopView => "Desktop View",
            Self::FileTransfer => "File Transfer",
            Self::SystemInfo => "System Information",
            Self::PowerManage => "Power Manage",
        }
    }
}

// ─── Desktop Session Configuration ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoEncoding {
    Zlib = 1,
    Vp8 = 2,
    Vp9 = 4,
}

impl Default for VideoEncoding {
    fn default() -> Self { Self::Vp8 }
}

impl VideoEncoding {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Zlib),
            2 => Some(Self::Vp8),
            4 => Some(Self::Vp9),
            _ => None,
        }
    }
}

/// Bit flags stored in [`DesktopSessionConfig::flags`].
pub mod session_flags {
    pub const ENABLE_CLIPBOARD: u32 = 1;
    pub const ENABLE_CURSOR_SHAPE: u32 = 2;
    pub const DISABLE_DESKTOP_EFFECTS: u32 = 4;
    pub const DISABLE_WALLPAPER: u32 = 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelFormat {
    pub bits_per_pixel: u32,
    pub red_max: u32,
    pub green_max: u32,
    pub blue_max: u32,
    pub red_shift: u32,
    pub green_shift: u32,
    pub blue_shift: u32,
}

impl PixelFormat {
    /// 32-bit ARGB.
    pub fn argb() -> Self {
        Self {
            bits_per_pixel: 32,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// 16-bit RGB565.
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self { Self::argb() }
}

/// Per-session configuration owned by a profile. One instance drives the
/// interactive management session, another the view-only session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopSessionConfig {
    pub flags: u32,
    pub video_encoding: VideoEncoding,
    pub pixel_format: PixelFormat,
    pub update_interval_ms: u32,
    pub compress_ratio: u32,
}

impl Default for DesktopSessionConfig {
    fn default() -> Self {
        Self {
            flags: session_flags::ENABLE_CLIPBOARD
                | session_flags::ENABLE_CURSOR_SHAPE
                | session_flags::DISABLE_DESKTOP_EFFECTS,
            video_encoding: VideoEncoding::default(),
            pixel_format: PixelFormat::default(),
            update_interval_ms: 30,
            compress_ratio: 6,
        }
    }
}

impl DesktopSessionConfig {
    /// Defaults for the view-only session: no clipboard.
    pub fn view_only() -> Self {
        Self {
            flags: session_flags::ENABLE_CURSOR_SHAPE | session_flags::DISABLE_DESKTOP_EFFECTS,
            ..Self::default()
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

// ─── Catalog Nodes ──────────────────────────────────────────────────

/// A single remote machine ("Computer").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub create_time: i64,
    pub modify_time: i64,
    /// 0 = never connected.
    pub connect_time: i64,
    pub name: String,
    pub comment: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub session_type: SessionType,
    pub manage_config: DesktopSessionConfig,
    pub view_config: DesktopSessionConfig,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        let now = unix_now();
        Self {
            create_time: now,
            modify_time: now,
            connect_time: 0,
            name: String::new(),
            comment: String::new(),
            address: String::new(),
            port: DEFAULT_HOST_PORT,
            username: String::new(),
            password: String::new(),
            session_type: SessionType::default(),
            manage_config: DesktopSessionConfig::default(),
            view_config: DesktopSessionConfig::view_only(),
        }
    }
}

impl ConnectionProfile {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn touch(&mut self) {
        self.modify_time = unix_now();
    }

    pub fn mark_connected(&mut self) {
        self.connect_time = unix_now();
    }
}

/// Attribute block of a group ("ComputerGroup"). Children are owned by the
/// tree, not by this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileGroup {
    pub create_time: i64,
    pub modify_time: i64,
    pub name: String,
    pub comment: String,
    /// UI-only tree state.
    pub expanded: bool,
}

impl Default for ProfileGroup {
    fn default() -> Self {
        let now = unix_now();
        Self {
            create_time: now,
            modify_time: now,
            name: String::new(),
            comment: String::new(),
            expanded: false,
        }
    }
}

impl ProfileGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn touch(&mut self) {
        self.modify_time = unix_now();
    }
}

// ─── Encryption Modes ───────────────────────────────────────────────

/// Encryption mode declared in the container header. `0` is reserved and
/// never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMode {
    None = 1,
    XChaCha20Poly1305 = 2,
}

impl Default for EncryptionMode {
    fn default() -> Self { Self::XChaCha20Poly1305 }
}

impl EncryptionMode {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::None),
            2 => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::XChaCha20Poly1305 => "xchacha20-poly1305",
        }
    }
}
