use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::Serialize;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

const FRAME_MARGIN: u32 = 50;
const FRAME_STROKE: u32 = 3;
const LABEL_X: u32 = 50;
const LABEL_Y: u32 = 20;
const LABEL_WIDTH: u32 = 200;
const LABEL_HEIGHT: u32 = 30;
// Top of the text line; puts a 16px baseline near y = 40.
const TEXT_X: i32 = 60;
const TEXT_Y: i32 = 27;
const TEXT_SCALE: f32 = 16.0;

const KNOWN_FACE_COLOR: [u8; 3] = [0x4C, 0xAF, 0x50];
const UNKNOWN_FACE_COLOR: [u8; 3] = [0xFF, 0xC1, 0x07];
const KNOWN_TEXT_COLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];
const UNKNOWN_TEXT_COLOR: [u8; 3] = [0x00, 0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationKind {
    KnownFace,
    UnknownFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverlayRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Rectangle and label drawn over a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub label: String,
    pub color: String,
    pub text_color: String,
    pub frame: Option<OverlayRect>,
    pub label_box: OverlayRect,
}

impl Annotation {
    pub fn known_face(name: &str, width: u32, height: u32) -> Self {
        Self::layout(AnnotationKind::KnownFace, name.to_string(), width, height)
    }

    pub fn unknown_face(width: u32, height: u32) -> Self {
        Self::layout(
            AnnotationKind::UnknownFace,
            "Unknown Person".to_string(),
            width,
            height,
        )
    }

    fn layout(kind: AnnotationKind, label: String, width: u32, height: u32) -> Self {
        let frame = (width > 2 * FRAME_MARGIN && height > 2 * FRAME_MARGIN).then(|| OverlayRect {
            x: FRAME_MARGIN,
            y: FRAME_MARGIN,
            width: width - 2 * FRAME_MARGIN,
            height: height - 2 * FRAME_MARGIN,
        });

        Self {
            kind,
            label,
            color: hex(kind.rgb()),
            text_color: hex(kind.text_rgb()),
            frame,
            label_box: OverlayRect {
                x: LABEL_X,
                y: LABEL_Y,
                width: LABEL_WIDTH,
                height: LABEL_HEIGHT,
            },
        }
    }
}

impl AnnotationKind {
    fn rgb(self) -> [u8; 3] {
        match self {
            AnnotationKind::KnownFace => KNOWN_FACE_COLOR,
            AnnotationKind::UnknownFace => UNKNOWN_FACE_COLOR,
        }
    }

    fn text_rgb(self) -> [u8; 3] {
        match self {
            AnnotationKind::KnownFace => KNOWN_TEXT_COLOR,
            AnnotationKind::UnknownFace => UNKNOWN_TEXT_COLOR,
        }
    }
}

fn hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Paint the annotation's frame, label box and label text into `image`.
/// Parts that fall outside the image are clipped.
pub fn draw(image: &mut RgbImage, annotation: &Annotation) {
    let color = Rgb(annotation.kind.rgb());

    if let Some(frame) = annotation.frame {
        for inset in 0..FRAME_STROKE {
            let width = frame.width.saturating_sub(2 * inset);
            let height = frame.height.saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((frame.x + inset) as i32, (frame.y + inset) as i32).of_size(width, height);
            draw_hollow_rect_mut(image, rect, color);
        }
    }

    let label = annotation.label_box;
    let rect = Rect::at(label.x as i32, label.y as i32).of_size(label.width, label.height);
    draw_filled_rect_mut(image, rect, color);

    match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => draw_text_mut(
            image,
            Rgb(annotation.kind.text_rgb()),
            TEXT_X,
            TEXT_Y,
            PxScale::from(TEXT_SCALE),
            &font,
            &annotation.label,
        ),
        Err(err) => log::warn!("label font unavailable, drawing box only: {err}"),
    }
}
