//! 画面叠加层: 跟踪框、动作结果、FPS横幅、退出提示
//!
//! 色块总是绘制; 文字需要配置字体 (`font_path`), 未配置时跳过。

use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::action::ActionResult;
use crate::detection::TrackingResult;
use crate::Frame;

const BANNER: Rgb<u8> = Rgb([16, 50, 245]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BANNER_WIDTH: u32 = 400;
const TEXT_SCALE: f32 = 28.0;
const HINT_SCALE: f32 = 16.0;

/// 概率向下取整到3位小数
pub fn floor_probability(probability: f32) -> f32 {
    (probability * 1000.0).floor() / 1000.0
}

pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    /// 字体加载失败时只画色块
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| {
            let loaded = fs::read(path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));
            match loaded {
                Ok(font) => {
                    info!("🔤 叠加层字体: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ 字体加载失败 {}: {}, 不绘制文字", path.display(), e);
                    None
                }
            }
        });
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 跟踪框 + "ID: n"
    pub fn draw_tracking(&self, frame: &mut Frame, tracking: &TrackingResult) {
        let bbox = tracking.bbox;
        if bbox.width > 0 && bbox.height > 0 {
            let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.width as u32, bbox.height as u32);
            draw_hollow_rect_mut(frame, rect, BANNER);
            // 2像素线宽
            if bbox.width > 2 && bbox.height > 2 {
                let inner = Rect::at(bbox.x + 1, bbox.y + 1)
                    .of_size(bbox.width as u32 - 2, bbox.height as u32 - 2);
                draw_hollow_rect_mut(frame, inner, BANNER);
            }
        }
        self.text(
            frame,
            BANNER,
            bbox.x,
            bbox.y - 10 - TEXT_SCALE as i32,
            TEXT_SCALE,
            &format!("ID: {}", tracking.identity),
        );
    }

    /// 动作 + 概率
    pub fn draw_action(&self, frame: &mut Frame, action: &ActionResult) {
        draw_filled_rect_mut(frame, Rect::at(0, 0).of_size(BANNER_WIDTH, 130), BANNER);
        self.text(
            frame,
            WHITE,
            20,
            50,
            TEXT_SCALE,
            &format!("Action: {}", action.label),
        );
        self.text(
            frame,
            WHITE,
            20,
            90,
            TEXT_SCALE,
            &format!("Probability: {}", floor_probability(action.probability)),
        );
    }

    /// FPS横幅 + 退出提示
    pub fn draw_status(&self, frame: &mut Frame, fps: u32) {
        draw_filled_rect_mut(frame, Rect::at(0, 0).of_size(BANNER_WIDTH, 50), BANNER);
        self.text(frame, WHITE, 20, 10, TEXT_SCALE, &format!("FPS: {}", fps));
        let y = frame.height() as i32 - 10 - HINT_SCALE as i32;
        self.text(frame, WHITE, 10, y, HINT_SCALE, "Press 'Q' to Exit");
    }

    fn text(&self, frame: &mut Frame, color: Rgb<u8>, x: i32, y: i32, scale: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(frame, color, x, y, PxScale::from(scale), font, text);
        }
    }
}
