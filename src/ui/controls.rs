use iced::widget::{button, container, text, Row};
use iced::{Alignment, Element};

use crate::playback::{PlaybackState, PlaybackStatus};

#[derive(Debug, Clone, Copy)]
pub enum ControlMessage {
    Play,
    Pause,
}

/// Format seconds as `m:ss` with zero-padded seconds. Rounding that lands
/// on 60 seconds rolls into the next minute; non-finite input reads as 0:00.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Timer readout: current position, and `/ duration` only when the
/// duration is known.
fn timer_label(state: &PlaybackState) -> String {
    let current = format_time(state.current_time);
    if state.is_duration_unknown() {
        current
    } else {
        format!("{} / {}", current, format_time(state.duration))
    }
}

/// Transport row: play/pause toggle plus the timer region, or the error
/// message when playback failed.
pub fn view_controls<'a>(state: &PlaybackState) -> Element<'a, ControlMessage> {
    let toggle = if state.status == PlaybackStatus::Playing {
        button(text("Pause")).on_press(ControlMessage::Pause)
    } else {
        let play = button(text("Play"));
        // play is only meaningful once enough data is buffered
        if state.status == PlaybackStatus::Ready {
            play.on_press(ControlMessage::Play)
        } else {
            play
        }
    };

    let status: Element<'a, ControlMessage> = match (&state.error, state.status) {
        (Some(error), PlaybackStatus::Error) => text(error.to_string())
            .size(14)
            .color(iced::Color::from_rgb(1.0, 0.3, 0.3))
            .into(),
        _ => text(timer_label(state)).size(16).into(),
    };

    container(
        Row::new()
            .spacing(10)
            .align_y(Alignment::Center)
            .push(toggle)
            .push(status),
    )
    .padding(10)
    .into()
}
