use serde::{Deserialize, Serialize};

/// Тип проекции вьюпорта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    Parallel,
    Perspective,
    /// Пользовательская матрица 4x4
    Custom,
}

impl ProjectionMode {
    pub fn all() -> &'static [ProjectionMode] {
        &[
            ProjectionMode::Parallel,
            ProjectionMode::Perspective,
            ProjectionMode::Custom,
        ]
    }
}

/// Способ вписывания объёма обзора в окно
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportMode {
    /// Объём расширяется, чтобы сохранить пропорции окна
    #[default]
    Relative,
    /// Объём растягивается на всё окно
    DistortingRelative,
    /// Объём задаётся через отображение единиц в пиксели
    Absolute,
}

/// Раскладка панелей в окне
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutMode {
    #[default]
    #[serde(rename = "simple")]
    Simple,
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "orthographic")]
    Orthographic,
    #[serde(rename = "free_ortho")]
    FreeOrtho,
    #[serde(rename = "front_back")]
    FrontBack,
    #[serde(rename = "front_side")]
    FrontSide,
    #[serde(rename = "pseudo_3d")]
    Pseudo3D,
    #[serde(rename = "two_free")]
    TwoFree,
}

impl LayoutMode {
    /// Все раскладки в порядке объявления
    pub fn all() -> &'static [LayoutMode] {
        &[
            LayoutMode::Simple,
            LayoutMode::TwoD,
            LayoutMode::Orthographic,
            LayoutMode::FreeOrtho,
            LayoutMode::FrontBack,
            LayoutMode::FrontSide,
            LayoutMode::Pseudo3D,
            LayoutMode::TwoFree,
        ]
    }

    /// Имя раскладки (совпадает с serde-представлением)
    pub fn name(&self) -> &'static str {
        match self {
            LayoutMode::Simple => "simple",
            LayoutMode::TwoD => "2d",
            LayoutMode::Orthographic => "orthographic",
            LayoutMode::FreeOrtho => "free_ortho",
            LayoutMode::FrontBack => "front_back",
            LayoutMode::FrontSide => "front_side",
            LayoutMode::Pseudo3D => "pseudo_3d",
            LayoutMode::TwoFree => "two_free",
        }
    }

    /// Поиск раскладки по имени
    pub fn from_name(name: &str) -> Option<LayoutMode> {
        LayoutMode::all()
            .iter()
            .copied()
            .find(|mode| mode.name() == name)
    }
}

/// Параметры камеры: глаз, точка взгляда, вектор "вверх"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    pub eye: [f64; 3],
    pub lookat: [f64; 3],
    pub up: [f64; 3],
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 10.0],
            lookat: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

/// Объём обзора. left/right/bottom/top задаются в плоскости точки взгляда,
/// near/far отсчитываются от глаза.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewVolume {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for ViewVolume {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl ViewVolume {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Центр окна обзора (x, y)
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.left + self.right),
            0.5 * (self.bottom + self.top),
        )
    }

    /// Проверка корректности: left < right, bottom < top, near < far
    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.bottom < self.top && self.near < self.far
    }

    /// Часть объёма, соответствующая пиксельному прямоугольнику внутри
    /// окна `width` x `height` (начало координат внизу слева).
    pub fn sub_volume(&self, rect: &PixelRect, width: u32, height: u32) -> ViewVolume {
        let dx = self.width() / width as f64;
        let dy = self.height() / height as f64;
        let x0 = rect.left as f64;
        let y0 = rect.bottom as f64;
        ViewVolume {
            left: self.left + dx * x0,
            right: self.left + dx * (x0 + rect.width as f64),
            bottom: self.bottom + dy * y0,
            top: self.bottom + dy * (y0 + rect.height as f64),
            near: self.near,
            far: self.far,
        }
    }
}

/// Размещение в нормализованных координатах устройства
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NdcPlacement {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for NdcPlacement {
    fn default() -> Self {
        Self {
            left: -1.0,
            top: 1.0,
            width: 2.0,
            height: 2.0,
        }
    }
}

/// Прямоугольник в пикселях, начало координат внизу слева
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: i32,
    pub bottom: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(left: i32, bottom: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Собранное изображение: RGBA8, строки сверху вниз
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CapturedImage {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Пиксель (x, y), y отсчитывается сверху
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Строка пикселей, y отсчитывается сверху
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.width as usize * Self::BYTES_PER_PIXEL;
        let start = y as usize * stride;
        Some(&self.pixels[start..start + stride])
    }
}
