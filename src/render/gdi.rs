// gdi.rs - Layered GDI overlay window.
//
// A click-through, topmost popup that sits exactly on the target window.
// Frames are drawn into an off-screen bitmap and blitted in one go. Black is
// the transparency color key, so the cleared bitmap shows the game through.
//
// All GDI handles are owned by `GdiOverlay` and released on drop.

use std::mem;
use std::ptr;

use tracing::{debug, warn};
use winapi::shared::minwindef::FALSE;
use winapi::shared::windef::{HBITMAP, HDC, HGDIOBJ, HWND, RECT};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::wingdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, CreatePen, CreateSolidBrush, DeleteDC,
    DeleteObject, GetStockObject, PatBlt, Rectangle, SelectObject, BLACKNESS, NULL_BRUSH,
    PS_SOLID, RGB, SRCCOPY,
};
use winapi::um::winuser::{
    CreateWindowExW, DestroyWindow, DispatchMessageW, FillRect, FindWindowW, GetDC,
    GetWindowRect, IsWindow, PeekMessageW, ReleaseDC, SetLayeredWindowAttributes, SetWindowPos,
    TranslateMessage, HWND_TOPMOST, LWA_COLORKEY, MSG, PM_REMOVE, SWP_NOACTIVATE, WS_EX_LAYERED,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP, WS_VISIBLE,
};

use super::{band_color, box_rect, DrawCommand, HealthBar, PixelRect, Renderer, Rgb, WindowRect, GREEN, RED};
use crate::entities::HealthBand;
use crate::error::OverlayError;

const BOX_PEN_WIDTH: i32 = 2;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

fn colorref(c: Rgb) -> u32 {
    RGB(c.0, c.1, c.2)
}

unsafe fn window_rect(hwnd: HWND) -> Option<WindowRect> {
    let mut rc: RECT = mem::zeroed();
    if GetWindowRect(hwnd, &mut rc) == 0 {
        return None;
    }
    let (width, height) = (rc.right - rc.left, rc.bottom - rc.top);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(WindowRect { x: rc.left, y: rc.top, width, height })
}

pub struct GdiOverlay {
    target: HWND,
    overlay: HWND,
    window_dc: HDC,
    mem_dc: HDC,
    bitmap: HBITMAP,
    old_bitmap: HGDIOBJ,
    /// Size of `bitmap`.
    surface: (i32, i32),
    /// Target rectangle from the previous refresh.
    rect: WindowRect,
    pending: Vec<DrawCommand>,
}

impl GdiOverlay {
    /// Find the target window by title, then by class, and cover it.
    pub fn attach(title: &str, class: &str) -> Result<Self, OverlayError> {
        let not_found = || OverlayError::WindowNotFound {
            title: title.to_owned(),
            class: class.to_owned(),
        };

        unsafe {
            let title_w = wide(title);
            let mut target = FindWindowW(ptr::null(), title_w.as_ptr());
            if target.is_null() {
                let class_w = wide(class);
                target = FindWindowW(class_w.as_ptr(), ptr::null());
            }
            if target.is_null() {
                return Err(not_found());
            }
            let rect = window_rect(target).ok_or_else(not_found)?;

            let static_class = wide("STATIC");
            let overlay = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
                static_class.as_ptr(),
                ptr::null(),
                WS_POPUP | WS_VISIBLE,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                ptr::null_mut(),
                ptr::null_mut(),
                GetModuleHandleW(ptr::null()),
                ptr::null_mut(),
            );
            if overlay.is_null() {
                return Err(OverlayError::WindowCreation(format!(
                    "CreateWindowExW failed: err={}",
                    GetLastError()
                )));
            }
            SetLayeredWindowAttributes(overlay, RGB(0, 0, 0), 0, LWA_COLORKEY);

            let window_dc = GetDC(overlay);
            let mem_dc = CreateCompatibleDC(window_dc);
            let bitmap = CreateCompatibleBitmap(window_dc, rect.width, rect.height);
            let old_bitmap = SelectObject(mem_dc, bitmap as HGDIOBJ);
            if window_dc.is_null() || mem_dc.is_null() || bitmap.is_null() {
                let err = GetLastError();
                let partial = Self {
                    target,
                    overlay,
                    window_dc,
                    mem_dc,
                    bitmap,
                    old_bitmap,
                    surface: (rect.width, rect.height),
                    rect,
                    pending: Vec::new(),
                };
                drop(partial);
                return Err(OverlayError::WindowCreation(format!(
                    "device context setup failed: err={err}"
                )));
            }

            debug!(?rect, "overlay window created");
            Ok(Self {
                target,
                overlay,
                window_dc,
                mem_dc,
                bitmap,
                old_bitmap,
                surface: (rect.width, rect.height),
                rect,
                pending: Vec::new(),
            })
        }
    }

    /// Recreate the back buffer when the target was resized.
    unsafe fn ensure_surface(&mut self) {
        let size = (self.rect.width, self.rect.height);
        if size == self.surface {
            return;
        }
        let bitmap = CreateCompatibleBitmap(self.window_dc, size.0, size.1);
        if bitmap.is_null() {
            warn!(?size, "failed to resize overlay surface");
            return;
        }
        SelectObject(self.mem_dc, bitmap as HGDIOBJ);
        DeleteObject(self.bitmap as HGDIOBJ);
        self.bitmap = bitmap;
        self.surface = size;
    }

    unsafe fn fill(&self, r: PixelRect, color: Rgb) {
        let brush = CreateSolidBrush(colorref(color));
        let rc = RECT { left: r.left, top: r.top, right: r.right, bottom: r.bottom };
        FillRect(self.mem_dc, &rc, brush);
        DeleteObject(brush as HGDIOBJ);
    }

    unsafe fn outline(&self, r: PixelRect, band: HealthBand) {
        let pen = CreatePen(PS_SOLID as i32, BOX_PEN_WIDTH, colorref(band_color(band)));
        let old_pen = SelectObject(self.mem_dc, pen as HGDIOBJ);
        let old_brush = SelectObject(self.mem_dc, GetStockObject(NULL_BRUSH as i32));
        Rectangle(self.mem_dc, r.left, r.top, r.right, r.bottom);
        SelectObject(self.mem_dc, old_brush);
        SelectObject(self.mem_dc, old_pen);
        DeleteObject(pen as HGDIOBJ);
    }

    fn pump_messages(&self) {
        unsafe {
            let mut msg: MSG = mem::zeroed();
            while PeekMessageW(&mut msg, self.overlay, 0, 0, PM_REMOVE) != FALSE {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

impl Renderer for GdiOverlay {
    fn refresh(&mut self) -> bool {
        unsafe {
            if IsWindow(self.target) == FALSE {
                return false;
            }
            if let Some(rect) = window_rect(self.target) {
                if rect != self.rect {
                    SetWindowPos(
                        self.overlay,
                        HWND_TOPMOST,
                        rect.x,
                        rect.y,
                        rect.width,
                        rect.height,
                        SWP_NOACTIVATE,
                    );
                    self.rect = rect;
                }
            }
        }
        self.pump_messages();
        self.pending.clear();
        true
    }

    fn window_rect(&self) -> WindowRect {
        self.rect
    }

    fn draw_box(&mut self, x: f32, y: f32, w: f32, h: f32, band: HealthBand) {
        self.pending.push(DrawCommand::Box { x, y, w, h, band });
    }

    fn draw_health_bar(&mut self, x: f32, y: f32, w: f32, health: i32) {
        self.pending.push(DrawCommand::HealthBar { x, y, w, health });
    }

    fn present(&mut self) {
        unsafe {
            self.ensure_surface();
            let (w, h) = self.surface;
            PatBlt(self.mem_dc, 0, 0, w, h, BLACKNESS);

            for cmd in &self.pending {
                match *cmd {
                    DrawCommand::Box { x, y, w, h, band } => self.outline(box_rect(x, y, w, h), band),
                    DrawCommand::HealthBar { x, y, w, health } => {
                        let bar = HealthBar::layout(x, y, w, health);
                        self.fill(bar.background, RED);
                        if let Some(fill) = bar.fill {
                            self.fill(fill, GREEN);
                        }
                    }
                }
            }

            if BitBlt(self.window_dc, 0, 0, w, h, self.mem_dc, 0, 0, SRCCOPY) == FALSE {
                debug!(err = GetLastError(), "BitBlt failed");
            }
        }
        self.pending.clear();
    }
}

impl Drop for GdiOverlay {
    fn drop(&mut self) {
        unsafe {
            if !self.mem_dc.is_null() {
                SelectObject(self.mem_dc, self.old_bitmap);
                DeleteDC(self.mem_dc);
            }
            if !self.bitmap.is_null() {
                DeleteObject(self.bitmap as HGDIOBJ);
            }
            if !self.window_dc.is_null() {
                ReleaseDC(self.overlay, self.window_dc);
            }
            DestroyWindow(self.overlay);
        }
    }
}
