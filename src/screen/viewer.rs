//! Terminal graphics for decoded frames using ratatui-image.
//!
//! Picks the best protocol the terminal supports:
//! - Sixel (xterm, foot, WezTerm, Windows Terminal)
//! - Kitty graphics protocol (Kitty, WezTerm, Ghostty)
//! - iTerm2 inline images
//! - Halfblocks fallback (any terminal with 24-bit color)

use image::DynamicImage;
use log::warn;
use ratatui_image::picker::{Picker, ProtocolType};
use ratatui_image::protocol::StatefulProtocol;

use crate::video::Frame;

/// Parse a `--graphics` value
pub fn parse_protocol(name: &str) -> Option<ProtocolType> {
    match name.to_lowercase().as_str() {
        "sixel" => Some(ProtocolType::Sixel),
        "kitty" => Some(ProtocolType::Kitty),
        "iterm2" | "iterm" => Some(ProtocolType::Iterm2),
        "halfblocks" | "half" | "text" => Some(ProtocolType::Halfblocks),
        _ => None,
    }
}

/// Create a Picker, either forced to `force_protocol` or detected.
///
/// Must run BEFORE entering raw mode / alternate screen: detection queries the
/// terminal over stdio.
pub fn create_picker(force_protocol: Option<&str>) -> Picker {
    if let Some(proto_name) = force_protocol {
        match parse_protocol(proto_name) {
            Some(proto_type) => {
                let mut picker = Picker::halfblocks();
                picker.set_protocol_type(proto_type);
                eprintln!("🖥️  Graphics: forced {:?}", proto_type);
                return picker;
            }
            None => {
                warn!("unknown graphics protocol '{}', using auto-detect", proto_name);
            }
        }
    }

    auto_detect_picker()
}

fn auto_detect_picker() -> Picker {
    match Picker::from_query_stdio() {
        Ok(picker) => {
            eprintln!("🖥️  Graphics: detected {:?}", picker.protocol_type());
            picker
        }
        Err(_) => {
            let picker = env_heuristic_picker();
            eprintln!("🖥️  Graphics: {:?} (env heuristic)", picker.protocol_type());
            picker
        }
    }
}

/// Guess from environment variables when the terminal does not answer queries
fn env_heuristic_picker() -> Picker {
    let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default();
    let term = std::env::var("TERM").unwrap_or_default();
    let wt_session = std::env::var("WT_SESSION").unwrap_or_default();

    let proto = protocol_from_env(&term_program, &term, &wt_session);
    let mut picker = Picker::halfblocks();
    if proto != ProtocolType::Halfblocks {
        picker.set_protocol_type(proto);
    }
    picker
}

fn protocol_from_env(term_program: &str, term: &str, wt_session: &str) -> ProtocolType {
    if term_program.contains("WezTerm") {
        ProtocolType::Sixel
    } else if term_program.contains("iTerm") {
        ProtocolType::Iterm2
    } else if term.contains("xterm-kitty")
        || term_program.contains("kitty")
        || term_program.to_lowercase().contains("ghostty")
    {
        ProtocolType::Kitty
    } else if !wt_session.is_empty() {
        ProtocolType::Sixel
    } else {
        ProtocolType::Halfblocks
    }
}

/// Encode a frame for the picked protocol; resized to the render area on draw
pub fn frame_protocol(picker: &mut Picker, frame: &Frame) -> StatefulProtocol {
    picker.new_resize_protocol(DynamicImage::ImageRgb8(frame.to_rgb_image()))
}
