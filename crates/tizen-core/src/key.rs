//! Remote-control key codes accepted by the TV's control channel.
//!
//! Every key is sent on the wire as its string code (e.g. `"KEY_VOLUP"`)
//! inside a `ms.remote.control` message.  The [`Key`] enum is the closed set
//! of codes known to work on Tizen TVs; [`Key::as_str`] returns the exact
//! wire spelling.
//!
//! # Parsing user input
//!
//! [`Key`] implements [`FromStr`] so the CLI can accept key names typed by a
//! human.  Three spellings are accepted, tried in order:
//!
//! 1. The exact wire code: `KEY_VOLUP`
//! 2. The code without the `KEY_` prefix: `VOLUP`
//! 3. A case-insensitive match of either form: `key_volup`, `volup`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by [`Key::from_str`] when a name matches no known key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown key: {0}")]
pub struct UnknownKey(pub String);

/// Generates the [`Key`] enum together with its wire-code table.
///
/// Each entry is `Variant => "WIRE_CODE"`.  Keeping both in one list means a
/// key can never be added without its code.
macro_rules! keys {
    ($($variant:ident => $code:literal,)+) => {
        /// A remote-control key understood by the TV.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Key {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl Key {
            /// Every key in catalogue order.
            pub const ALL: &'static [Key] = &[$(Key::$variant,)+];

            /// Returns the exact code sent on the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Key::$variant => $code,)+
                }
            }
        }
    };
}

keys! {
    // Power
    PowerOff => "KEY_POWEROFF",
    PowerOn => "KEY_POWERON",
    Power => "KEY_POWER",

    // Input
    Source => "KEY_SOURCE",
    Component1 => "KEY_COMPONENT1",
    Component2 => "KEY_COMPONENT2",
    Av1 => "KEY_AV1",
    Av2 => "KEY_AV2",
    Av3 => "KEY_AV3",
    Svideo1 => "KEY_SVIDEO1",
    Svideo2 => "KEY_SVIDEO2",
    Svideo3 => "KEY_SVIDEO3",
    Hdmi => "KEY_HDMI",
    Hdmi1 => "KEY_HDMI1",
    Hdmi2 => "KEY_HDMI2",
    Hdmi3 => "KEY_HDMI3",
    Hdmi4 => "KEY_HDMI4",
    FmRadio => "KEY_FM_RADIO",
    Dvi => "KEY_DVI",
    Dvr => "KEY_DVR",
    Tv => "KEY_TV",
    Antena => "KEY_ANTENA",
    Dtv => "KEY_DTV",

    // Number
    Num1 => "KEY_1",
    Num2 => "KEY_2",
    Num3 => "KEY_3",
    Num4 => "KEY_4",
    Num5 => "KEY_5",
    Num6 => "KEY_6",
    Num7 => "KEY_7",
    Num8 => "KEY_8",
    Num9 => "KEY_9",
    Num0 => "KEY_0",

    // Misc
    PannelChdown => "KEY_PANNEL_CHDOWN",
    Anynet => "KEY_ANYNET",
    Esaving => "KEY_ESAVING",
    Sleep => "KEY_SLEEP",
    DtvSignal => "KEY_DTV_SIGNAL",

    // Channel
    ChUp => "KEY_CHUP",
    ChDown => "KEY_CHDOWN",
    Prech => "KEY_PRECH",
    Favch => "KEY_FAVCH",
    ChList => "KEY_CH_LIST",
    AutoProgram => "KEY_AUTO_PROGRAM",
    MagicChannel => "KEY_MAGIC_CHANNEL",

    // Volume
    VolUp => "KEY_VOLUP",
    VolDown => "KEY_VOLDOWN",
    Mute => "KEY_MUTE",

    // Direction
    Up => "KEY_UP",
    Down => "KEY_DOWN",
    Left => "KEY_LEFT",
    Right => "KEY_RIGHT",
    Return => "KEY_RETURN",
    Enter => "KEY_ENTER",

    // Media
    Rewind => "KEY_REWIND",
    Stop => "KEY_STOP",
    Play => "KEY_PLAY",
    Ff => "KEY_FF",
    Rec => "KEY_REC",
    Pause => "KEY_PAUSE",
    Live => "KEY_LIVE",
    QuickReplay => "KEY_QUICK_REPLAY",
    StillPicture => "KEY_STILL_PICTURE",
    InstantReplay => "KEY_INSTANT_REPLAY",

    // Picture in picture
    PipOnoff => "KEY_PIP_ONOFF",
    PipSwap => "KEY_PIP_SWAP",
    PipSize => "KEY_PIP_SIZE",
    PipChup => "KEY_PIP_CHUP",
    PipChdown => "KEY_PIP_CHDOWN",
    AutoArcPipSmall => "KEY_AUTO_ARC_PIP_SMALL",
    AutoArcPipWide => "KEY_AUTO_ARC_PIP_WIDE",
    AutoArcPipRightBottom => "KEY_AUTO_ARC_PIP_RIGHT_BOTTOM",
    AutoArcPipSourceChange => "KEY_AUTO_ARC_PIP_SOURCE_CHANGE",
    PipScan => "KEY_PIP_SCAN",

    // Mode
    VcrMode => "KEY_VCR_MODE",
    CatvMode => "KEY_CATV_MODE",
    DssMode => "KEY_DSS_MODE",
    TvMode => "KEY_TV_MODE",
    DvdMode => "KEY_DVD_MODE",
    StbMode => "KEY_STB_MODE",
    Pcmode => "KEY_PCMODE",

    // Color
    Green => "KEY_GREEN",
    Yellow => "KEY_YELLOW",
    Cyan => "KEY_CYAN",
    Red => "KEY_RED",

    // Teletext
    TtxMix => "KEY_TTX_MIX",
    TtxSubface => "KEY_TTX_SUBFACE",

    // Aspect ratio
    Aspect => "KEY_ASPECT",
    PictureSize => "KEY_PICTURE_SIZE",
    Aspect4By3 => "KEY_4_3",
    Aspect16By9 => "KEY_16_9",
    Ext14 => "KEY_EXT14",
    Ext15 => "KEY_EXT15",

    // Picture mode
    Pmode => "KEY_PMODE",
    Panorama => "KEY_PANORAMA",
    Dynamic => "KEY_DYNAMIC",
    Standard => "KEY_STANDARD",
    Movie1 => "KEY_MOVIE1",
    Game => "KEY_GAME",
    Custom => "KEY_CUSTOM",
    Ext9 => "KEY_EXT9",
    Ext10 => "KEY_EXT10",

    // Menu
    Menu => "KEY_MENU",
    Topmenu => "KEY_TOPMENU",
    Tools => "KEY_TOOLS",
    Home => "KEY_HOME",
    Contents => "KEY_CONTENTS",
    Guide => "KEY_GUIDE",
    DiscMenu => "KEY_DISC_MENU",
    DvrMenu => "KEY_DVR_MENU",
    Help => "KEY_HELP",

    // OSD
    Info => "KEY_INFO",
    Caption => "KEY_CAPTION",
    ClockDisplay => "KEY_CLOCK_DISPLAY",
    SetupClockTimer => "KEY_SETUP_CLOCK_TIMER",
    SubTitle => "KEY_SUB_TITLE",

    // Zoom
    ZoomMove => "KEY_ZOOM_MOVE",
    ZoomIn => "KEY_ZOOM_IN",
    ZoomOut => "KEY_ZOOM_OUT",
    Zoom1 => "KEY_ZOOM1",
    Zoom2 => "KEY_ZOOM2",

    // Other
    WheelLeft => "KEY_WHEEL_LEFT",
    WheelRight => "KEY_WHEEL_RIGHT",
    Adddel => "KEY_ADDDEL",
    Plus100 => "KEY_PLUS100",
    Ad => "KEY_AD",
    Link => "KEY_LINK",
    Turbo => "KEY_TURBO",
    Convergence => "KEY_CONVERGENCE",
    DeviceConnect => "KEY_DEVICE_CONNECT",
    Num11 => "KEY_11",
    Num12 => "KEY_12",
    Factory => "KEY_FACTORY",
    ThreeSpeed => "KEY_3SPEED",
    Rsurf => "KEY_RSURF",
    FfAlt => "KEY_FF_",
    RewindAlt => "KEY_REWIND_",
    Angle => "KEY_ANGLE",
    Reserved1 => "KEY_RESERVED1",
    Program => "KEY_PROGRAM",
    Bookmark => "KEY_BOOKMARK",
    Print => "KEY_PRINT",
    Clear => "KEY_CLEAR",
    Vchip => "KEY_VCHIP",
    Repeat => "KEY_REPEAT",
    Door => "KEY_DOOR",
    Open => "KEY_OPEN",
    Dma => "KEY_DMA",
    Mts => "KEY_MTS",
    Dnie => "KEY_DNIe",
    Srs => "KEY_SRS",
    ConvertAudioMainsub => "KEY_CONVERT_AUDIO_MAINSUB",
    Mdc => "KEY_MDC",
    Seffect => "KEY_SEFFECT",
    PerpectFocus => "KEY_PERPECT_FOCUS",
    CallerId => "KEY_CALLER_ID",
    Scale => "KEY_SCALE",
    MagicBright => "KEY_MAGIC_BRIGHT",
    WLink => "KEY_W_LINK",
    DtvLink => "KEY_DTV_LINK",
    AppList => "KEY_APP_LIST",
    BackMhp => "KEY_BACK_MHP",
    AltMhp => "KEY_ALT_MHP",
    Dnse => "KEY_DNSe",
    Rss => "KEY_RSS",
    Entertainment => "KEY_ENTERTAINMENT",
    IdInput => "KEY_ID_INPUT",
    IdSetup => "KEY_ID_SETUP",
    Anyview => "KEY_ANYVIEW",
    Ms => "KEY_MS",
    More => "KEY_MORE",
    Mic => "KEY_MIC",
    NineSeperate => "KEY_NINE_SEPERATE",
    AutoFormat => "KEY_AUTO_FORMAT",
    Dnet => "KEY_DNET",

    // Auto arc
    AutoArcCForceAging => "KEY_AUTO_ARC_C_FORCE_AGING",
    AutoArcCaptionEng => "KEY_AUTO_ARC_CAPTION_ENG",
    AutoArcUsbjackInspect => "KEY_AUTO_ARC_USBJACK_INSPECT",
    AutoArcReset => "KEY_AUTO_ARC_RESET",
    AutoArcLnaOn => "KEY_AUTO_ARC_LNA_ON",
    AutoArcLnaOff => "KEY_AUTO_ARC_LNA_OFF",
    AutoArcAnynetModeOk => "KEY_AUTO_ARC_ANYNET_MODE_OK",
    AutoArcAnynetAutoStart => "KEY_AUTO_ARC_ANYNET_AUTO_START",
    AutoArcCaptionOn => "KEY_AUTO_ARC_CAPTION_ON",
    AutoArcCaptionOff => "KEY_AUTO_ARC_CAPTION_OFF",
    AutoArcPipDouble => "KEY_AUTO_ARC_PIP_DOUBLE",
    AutoArcPipLarge => "KEY_AUTO_ARC_PIP_LARGE",
    AutoArcPipLeftTop => "KEY_AUTO_ARC_PIP_LEFT_TOP",
    AutoArcPipRightTop => "KEY_AUTO_ARC_PIP_RIGHT_TOP",
    AutoArcPipLeftBottom => "KEY_AUTO_ARC_PIP_LEFT_BOTTOM",
    AutoArcPipChChange => "KEY_AUTO_ARC_PIP_CH_CHANGE",
    AutoArcAutocolorSuccess => "KEY_AUTO_ARC_AUTOCOLOR_SUCCESS",
    AutoArcAutocolorFail => "KEY_AUTO_ARC_AUTOCOLOR_FAIL",
    AutoArcJackIdent => "KEY_AUTO_ARC_JACK_IDENT",
    AutoArcCaptionKor => "KEY_AUTO_ARC_CAPTION_KOR",
    AutoArcAntennaAir => "KEY_AUTO_ARC_ANTENNA_AIR",
    AutoArcAntennaCable => "KEY_AUTO_ARC_ANTENNA_CABLE",
    AutoArcAntennaSatellite => "KEY_AUTO_ARC_ANTENNA_SATELLITE",

    // Panel
    PannelPower => "KEY_PANNEL_POWER",
    PannelChup => "KEY_PANNEL_CHUP",
    PannelVolup => "KEY_PANNEL_VOLUP",
    PannelVoldow => "KEY_PANNEL_VOLDOW",
    PannelEnter => "KEY_PANNEL_ENTER",
    PannelMenu => "KEY_PANNEL_MENU",
    PannelSource => "KEY_PANNEL_SOURCE",

    // Extended
    Ext1 => "KEY_EXT1",
    Ext2 => "KEY_EXT2",
    Ext3 => "KEY_EXT3",
    Ext4 => "KEY_EXT4",
    Ext5 => "KEY_EXT5",
    Ext6 => "KEY_EXT6",
    Ext7 => "KEY_EXT7",
    Ext8 => "KEY_EXT8",
    Ext11 => "KEY_EXT11",
    Ext12 => "KEY_EXT12",
    Ext13 => "KEY_EXT13",
    Ext16 => "KEY_EXT16",
    Ext17 => "KEY_EXT17",
    Ext18 => "KEY_EXT18",
    Ext19 => "KEY_EXT19",
    Ext20 => "KEY_EXT20",
    Ext21 => "KEY_EXT21",
    Ext22 => "KEY_EXT22",
    Ext23 => "KEY_EXT23",
    Ext24 => "KEY_EXT24",
    Ext25 => "KEY_EXT25",
    Ext26 => "KEY_EXT26",
    Ext27 => "KEY_EXT27",
    Ext28 => "KEY_EXT28",
    Ext29 => "KEY_EXT29",
    Ext30 => "KEY_EXT30",
    Ext31 => "KEY_EXT31",
    Ext32 => "KEY_EXT32",
    Ext33 => "KEY_EXT33",
    Ext34 => "KEY_EXT34",
    Ext35 => "KEY_EXT35",
    Ext36 => "KEY_EXT36",
    Ext37 => "KEY_EXT37",
    Ext38 => "KEY_EXT38",
    Ext39 => "KEY_EXT39",
    Ext40 => "KEY_EXT40",
    Ext41 => "KEY_EXT41",
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let prefixed = format!("KEY_{trimmed}");

        let exact = Key::ALL
            .iter()
            .find(|k| k.as_str() == trimmed || k.as_str() == prefixed);
        if let Some(key) = exact {
            return Ok(*key);
        }

        Key::ALL
            .iter()
            .find(|k| {
                k.as_str().eq_ignore_ascii_case(trimmed) || k.as_str().eq_ignore_ascii_case(&prefixed)
            })
            .copied()
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
