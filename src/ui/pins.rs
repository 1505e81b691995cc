use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Pixels, Point, Rectangle, Renderer, Theme};

use crate::Message;

/// Radius of a comment pin in pixels
const PIN_RADIUS: f32 = 12.0;

/// A comment pin at a fractional image position
#[derive(Debug, Clone)]
pub struct Pin {
    pub comment_id: String,
    pub x: f32,
    pub y: f32,
    pub label: String,
    pub unread: bool,
    pub selected: bool,
}

/// Transparent layer drawn over an image
///
/// Draws comment pins and turns clicks into either a pin selection or a
/// fractional tap position, depending on which handlers are set.
pub struct TapOverlay {
    pub pins: Vec<Pin>,
    /// Every click reports its position (pin placement, surface taps)
    pub on_tap: Option<fn(f32, f32) -> Message>,
    /// Clicks on a pin select its comment
    pub on_pin: Option<fn(String) -> Message>,
}

impl TapOverlay {
    fn pin_at(&self, point: Point, bounds: Rectangle) -> Option<&Pin> {
        self.pins.iter().find(|pin| {
            let center = Point::new(pin.x * bounds.width, pin.y * bounds.height);
            center.distance(point) <= PIN_RADIUS
        })
    }
}

impl Program<Message> for TapOverlay {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        for pin in &self.pins {
            let center = Point::new(pin.x * bounds.width, pin.y * bounds.height);
            let circle = Path::circle(center, PIN_RADIUS);

            let fill = if pin.unread {
                Color::from_rgb8(0xE5, 0x48, 0x4D)
            } else {
                Color::from_rgb8(0x3B, 0x82, 0xF6)
            };
            frame.fill(&circle, fill);

            let ring = if pin.selected { Color::BLACK } else { Color::WHITE };
            frame.stroke(&circle, Stroke::default().with_color(ring).with_width(2.0));

            frame.fill_text(canvas::Text {
                content: pin.label.clone(),
                position: Point::new(center.x - 4.0, center.y - 7.0),
                color: Color::WHITE,
                size: Pixels(12.0),
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        _state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        let canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) = event else {
            return (canvas::event::Status::Ignored, None);
        };
        let Some(point) = cursor.position_in(bounds) else {
            return (canvas::event::Status::Ignored, None);
        };

        if let Some(on_tap) = self.on_tap {
            let x = point.x / bounds.width.max(1.0);
            let y = point.y / bounds.height.max(1.0);
            return (canvas::event::Status::Captured, Some(on_tap(x, y)));
        }

        if let (Some(on_pin), Some(pin)) = (self.on_pin, self.pin_at(point, bounds)) {
            return (
                canvas::event::Status::Captured,
                Some(on_pin(pin.comment_id.clone())),
            );
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        match cursor.position_in(bounds) {
            Some(_) if self.on_tap.is_some() => mouse::Interaction::Crosshair,
            Some(point) if self.pin_at(point, bounds).is_some() => mouse::Interaction::Pointer,
            _ => mouse::Interaction::default(),
        }
    }
}
