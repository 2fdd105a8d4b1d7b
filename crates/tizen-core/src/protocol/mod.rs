//! Protocol module containing the control-channel message types and JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{
    check_launch_ack, classify_frame, decode_connect_event, decode_installed_apps,
    encode_installed_apps_query, encode_key_command, encode_launch_app, Frame, ProtocolError,
};
pub use messages::*;
