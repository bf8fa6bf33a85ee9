use std::cell::RefCell;
use std::sync::Arc;

use iced::border::Radius;
use iced::mouse;
use iced::widget::canvas::{self, Action, Cache, Event, Frame, Geometry, Path};
use iced::{Color, Length, Point, Rectangle, Renderer, Size, Theme};

use crate::audio::types::AudioData;
use crate::peaks::{Peak, PeakCache};

/// A bar shorter than this still renders a visible sliver.
const MIN_BAR_HEIGHT: f32 = 1.0;

const DEFAULT_BAR_WIDTH: f32 = 2.0;
const DEFAULT_BAR_GAP: f32 = 1.0;
const DEFAULT_HEIGHT: f32 = 48.0;

/// Vertical anchoring of the bars inside the widget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BarAlignment {
    Top,
    /// Centered, with independent above/below extents from the stereo
    /// peak pair.
    Middle,
    #[default]
    Bottom,
}

/// Pure rendering parameters for the peaks bar. Every field has a default
/// and [`sanitized`](BarGeometry::sanitized) falls back to it on
/// non-finite or otherwise unusable input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarGeometry {
    pub bar_width: f32,
    pub bar_gap: f32,
    pub corner_radius: f32,
    pub alignment: BarAlignment,
    /// Fixed widget height in pixels.
    pub height: f32,
    /// Unplayed bar color.
    pub color: Color,
    /// Played-fraction bar color.
    pub progress_color: Color,
    pub background: Color,
}

impl Default for BarGeometry {
    fn default() -> Self {
        Self {
            bar_width: DEFAULT_BAR_WIDTH,
            bar_gap: DEFAULT_BAR_GAP,
            corner_radius: 0.0,
            alignment: BarAlignment::default(),
            height: DEFAULT_HEIGHT,
            color: Color::from_rgb(0.55, 0.55, 0.6),
            progress_color: Color::from_rgb(0.3, 0.7, 1.0),
            background: Color::TRANSPARENT,
        }
    }
}

impl BarGeometry {
    /// Replace unusable values with the defaults: width and height must be
    /// positive and finite, gap and radius non-negative and finite.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            bar_width: if self.bar_width.is_finite() && self.bar_width > 0.0 {
                self.bar_width
            } else {
                defaults.bar_width
            },
            bar_gap: if self.bar_gap.is_finite() && self.bar_gap >= 0.0 {
                self.bar_gap
            } else {
                defaults.bar_gap
            },
            corner_radius: if self.corner_radius.is_finite() && self.corner_radius >= 0.0 {
                self.corner_radius
            } else {
                defaults.corner_radius
            },
            height: if self.height.is_finite() && self.height > 0.0 {
                self.height
            } else {
                defaults.height
            },
            ..self
        }
    }

    /// Bars that fit a container of `width` pixels.
    pub fn bar_count(&self, width: f32) -> usize {
        if !width.is_finite() || width <= 0.0 {
            return 0;
        }
        (width / (self.bar_width + self.bar_gap)).round() as usize
    }
}

/// One bar's rectangle within the widget, per the configured alignment.
fn bar_rect(index: usize, peak: Peak, geometry: &BarGeometry, height: f32) -> Rectangle {
    let x = index as f32 * (geometry.bar_width + geometry.bar_gap);
    match geometry.alignment {
        BarAlignment::Top => {
            let h = ((peak.amplitude() * height).floor()).max(MIN_BAR_HEIGHT);
            Rectangle::new(Point::new(x, 0.0), Size::new(geometry.bar_width, h))
        }
        BarAlignment::Bottom => {
            let h = ((peak.amplitude() * height).floor()).max(MIN_BAR_HEIGHT);
            Rectangle::new(
                Point::new(x, height - h),
                Size::new(geometry.bar_width, h),
            )
        }
        BarAlignment::Middle => {
            let half = height / 2.0;
            let above = ((peak.top * half).floor()).max(MIN_BAR_HEIGHT / 2.0);
            let below = ((peak.bottom * half).floor()).max(MIN_BAR_HEIGHT / 2.0);
            Rectangle::new(
                Point::new(x, half - above),
                Size::new(geometry.bar_width, above + below),
            )
        }
    }
}

/// Fraction of the widget width under `x`, clamped to [0, 1].
fn relative_position(x: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    (x / width).clamp(0.0, 1.0)
}

/// Events the peaks bar reports upward. Relative positions are fractions
/// of the widget width; the player maps them onto the duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeaksBarEvent {
    /// Click-to-seek or drag-to-seek at the given fraction.
    Seek(f32),
}

/// One pointer gesture: press, optional moves, release.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// Fraction captured at pointer-down.
        start: f32,
        /// Most recent fraction while moving.
        last: f32,
        moved: bool,
    },
}

impl DragState {
    /// Left-button press at `fraction` enters `Dragging`.
    fn press(fraction: f32) -> Self {
        DragState::Dragging { start: fraction, last: fraction, moved: false }
    }

    /// Pointer movement; returns the fraction to report live.
    fn moved_to(&mut self, fraction: f32) -> Option<f32> {
        match self {
            DragState::Dragging { last, moved, .. } => {
                *last = fraction;
                *moved = true;
                Some(fraction)
            }
            DragState::Idle => None,
        }
    }

    /// Release ends the gesture unconditionally. A gesture without
    /// movement reports the press fraction (a plain click); one with
    /// movement reports the release fraction.
    fn release(&mut self) -> Option<f32> {
        let result = match *self {
            DragState::Dragging { start, moved: false, .. } => Some(start),
            DragState::Dragging { last, moved: true, .. } => Some(last),
            DragState::Idle => None,
        };
        *self = DragState::Idle;
        result
    }
}

/// Waveform amplitude bars with a progress reveal and click/drag seeking.
///
/// The bar silhouette acts as the shared mask for both layers: the base
/// layer fills every bar in the unplayed color (cached until audio or
/// size changes), and the progress layer re-fills the same silhouette
/// restricted to the played fraction, so the reveal follows the exact bar
/// contours instead of a straight-edged overlay.
pub struct PeaksBar {
    geometry: BarGeometry,
    audio: Option<Arc<AudioData>>,
    progress: f32,
    silhouette: Cache,
    peaks: RefCell<PeakCache>,
}

impl PeaksBar {
    pub fn new(geometry: BarGeometry) -> Self {
        Self {
            geometry: geometry.sanitized(),
            audio: None,
            progress: 0.0,
            silhouette: Cache::new(),
            peaks: RefCell::new(PeakCache::new()),
        }
    }

    pub fn geometry(&self) -> &BarGeometry {
        &self.geometry
    }

    /// Swap in the decoded audio backing the bars.
    pub fn set_audio(&mut self, audio: Option<Arc<AudioData>>) {
        self.audio = audio;
        self.silhouette.clear();
    }

    /// Update the played fraction; only the progress layer re-renders.
    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    /// The bar as an iced element, full width at the configured height.
    pub fn view(&self) -> iced::Element<'_, PeaksBarEvent> {
        canvas::Canvas::new(self)
            .width(Length::Fill)
            .height(Length::Fixed(self.geometry.height))
            .into()
    }

    fn fill_silhouette(
        &self,
        frame: &mut Frame,
        peaks: &[Peak],
        color: Color,
        max_x: f32,
        height: f32,
    ) {
        let radius = Radius::from(self.geometry.corner_radius);
        for (i, peak) in peaks.iter().enumerate() {
            let rect = bar_rect(i, *peak, &self.geometry, height);
            if rect.x >= max_x {
                break;
            }
            // clip the boundary bar at the reveal edge
            let width = rect.width.min(max_x - rect.x);
            let path = if self.geometry.corner_radius > 0.0 && width >= rect.width {
                Path::rounded_rectangle(rect.position(), rect.size(), radius)
            } else {
                Path::rectangle(rect.position(), Size::new(width, rect.height))
            };
            frame.fill(&path, color);
        }
    }
}

impl canvas::Program<PeaksBarEvent> for PeaksBar {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        if bounds.width <= 0.0 || bounds.height <= 0.0 {
            log::debug!("peaks bar has no size yet; skipping draw");
            return Vec::new();
        }

        let bar_count = self.geometry.bar_count(bounds.width);
        let peaks = self
            .peaks
            .borrow_mut()
            .get(self.audio.as_ref(), bar_count)
            .to_vec();

        let base = self.silhouette.draw(renderer, bounds.size(), |frame| {
            frame.fill_rectangle(Point::ORIGIN, bounds.size(), self.geometry.background);
            self.fill_silhouette(frame, &peaks, self.geometry.color, f32::INFINITY, bounds.height);
        });

        let played = {
            let mut frame = Frame::new(renderer, bounds.size());
            let reveal_x = self.progress * bounds.width;
            if reveal_x > 0.0 {
                self.fill_silhouette(
                    &mut frame,
                    &peaks,
                    self.geometry.progress_color,
                    reveal_x,
                    bounds.height,
                );
            }
            frame.into_geometry()
        };

        vec![base, played]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<Action<PeaksBarEvent>> {
        match event {
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = cursor.position_in(bounds)?;
                let fraction = relative_position(position.x, bounds.width);
                *state = DragState::press(fraction);
                // capture so the press cannot reach enclosing widgets
                // mid-gesture; the fraction doubles as live feedback
                Some(Action::publish(PeaksBarEvent::Seek(fraction)).and_capture())
            }
            Event::Mouse(mouse::Event::CursorMoved { position }) => {
                // tracked against the widget origin even outside its
                // bounds, so a drag keeps following the pointer
                let fraction = relative_position(position.x - bounds.x, bounds.width);
                let reported = state.moved_to(fraction)?;
                Some(Action::publish(PeaksBarEvent::Seek(reported)).and_capture())
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let reported = state.release()?;
                Some(Action::publish(PeaksBarEvent::Seek(reported)).and_capture())
            }
            // non-primary buttons never mutate gesture state
            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if cursor.is_over(bounds) {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }
}
