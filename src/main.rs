//! Demo application: pick an audio file and play it through the widget.

use std::path::PathBuf;

use iced::keyboard;
use iced::widget::{button, column, container, row, text};
use iced::{Alignment, Element, Length, Subscription, Task, Theme};

use voicemail_player::player::{Message as PlayerMessage, VoicemailPlayer};
use voicemail_player::ui::controls::ControlMessage;
use voicemail_player::ui::BarGeometry;
use voicemail_player::PlaybackStatus;

struct App {
    player: VoicemailPlayer,
    filename: Option<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Player(PlayerMessage),
    OpenFile,
    FileChosen(Option<PathBuf>),
    FileRead(Result<(Vec<u8>, Option<String>, String), String>),
    KeyEvent(keyboard::Event),
}

fn boot() -> (App, Task<Message>) {
    let (player, task) = VoicemailPlayer::new(BarGeometry::default());
    let app = App {
        player,
        filename: None,
    };
    (app, task.map(Message::Player))
}

fn title(app: &App) -> String {
    match &app.filename {
        Some(name) => format!("Voicemail Player - {name}"),
        None => "Voicemail Player".to_string(),
    }
}

fn update(app: &mut App, message: Message) -> Task<Message> {
    match message {
        Message::Player(m) => app.player.update(m).map(Message::Player),
        Message::OpenFile => Task::perform(
            async {
                let handle = rfd::AsyncFileDialog::new()
                    .add_filter("Audio", &["mp3", "wav", "flac", "ogg", "aac"])
                    .pick_file()
                    .await;
                handle.map(|h| h.path().to_path_buf())
            },
            Message::FileChosen,
        ),
        Message::FileChosen(Some(path)) => Task::perform(
            async move {
                tokio::task::spawn_blocking(move || {
                    let extension = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(str::to_string);
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    std::fs::read(&path)
                        .map(|bytes| (bytes, extension, filename))
                        .map_err(|e| format!("failed to read {}: {e}", path.display()))
                })
                .await
                .map_err(|e| e.to_string())?
            },
            Message::FileRead,
        ),
        Message::FileChosen(None) => Task::none(),
        Message::FileRead(Ok((bytes, extension, filename))) => {
            app.player.set_source(bytes, extension);
            app.filename = Some(filename);
            Task::none()
        }
        Message::FileRead(Err(error)) => {
            app.player.report_transport_error(error);
            Task::none()
        }
        Message::KeyEvent(key_event) => match key_event {
            keyboard::Event::KeyPressed { key, .. } => match key.as_ref() {
                keyboard::Key::Named(keyboard::key::Named::Space) => {
                    let control = if app.player.playback().status == PlaybackStatus::Playing {
                        ControlMessage::Pause
                    } else {
                        ControlMessage::Play
                    };
                    app.player
                        .update(PlayerMessage::Control(control))
                        .map(Message::Player)
                }
                _ => Task::none(),
            },
            _ => Task::none(),
        },
    }
}

fn view(app: &App) -> Element<'_, Message> {
    let open_btn = button(text("Open File")).on_press(Message::OpenFile);
    let name = text(app.filename.as_deref().unwrap_or("No file loaded").to_string()).size(14);

    let header = row![open_btn, name].spacing(10).align_y(Alignment::Center);
    let player = app.player.view().map(Message::Player);

    container(column![header, player].spacing(10).padding(10))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn subscription(app: &App) -> Subscription<Message> {
    let player = app.player.subscription().map(Message::Player);
    let keys = keyboard::listen().map(Message::KeyEvent);
    Subscription::batch([player, keys])
}

fn theme(_app: &App) -> Theme {
    Theme::Dark
}

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("voicemail-player demo starting up");

    iced::application(boot, update, view)
        .title(title)
        .subscription(subscription)
        .theme(theme)
        .window_size((520.0, 180.0))
        .run()
}
