use binrw::binrw;
use cgmath::{Matrix4, Quaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// 3-component vector as stored in SGE data.
///
/// The interchange document spells the components out as `{"X":..,"Y":..,"Z":..}`.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
#[serde(from = "JsonVector3", into = "JsonVector3")]
pub struct SgeVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct JsonVector3 {
    x: f32,
    y: f32,
    z: f32,
}

impl From<JsonVector3> for SgeVector3 {
    fn from(v: JsonVector3) -> Self {
        SgeVector3(Vector3::new(v.x, v.y, v.z))
    }
}

impl From<SgeVector3> for JsonVector3 {
    fn from(v: SgeVector3) -> Self {
        JsonVector3 {
            x: v.0.x,
            y: v.0.y,
            z: v.0.z,
        }
    }
}

impl SgeVector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        SgeVector3(Vector3::new(x, y, z))
    }

    pub fn zero() -> Self {
        SgeVector3(Vector3::new(0.0, 0.0, 0.0))
    }

    pub fn one() -> Self {
        SgeVector3(Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }

    /// SGE stores Y-up with Z and Y swapped relative to the viewer convention.
    /// The swap is its own inverse, so this converts in both directions.
    pub fn swap_yz(&self) -> SgeVector3 {
        SgeVector3(Vector3::new(self.0.x, self.0.z, self.0.y))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
#[serde(from = "JsonVector2", into = "JsonVector2")]
pub struct SgeVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct JsonVector2 {
    x: f32,
    y: f32,
}

impl From<JsonVector2> for SgeVector2 {
    fn from(v: JsonVector2) -> Self {
        SgeVector2(Vector2::new(v.x, v.y))
    }
}

impl From<SgeVector2> for JsonVector2 {
    fn from(v: SgeVector2) -> Self {
        JsonVector2 { x: v.0.x, y: v.0.y }
    }
}

impl SgeVector2 {
    pub fn new(x: f32, y: f32) -> Self {
        SgeVector2(Vector2::new(x, y))
    }

    pub fn zero() -> Self {
        SgeVector2(Vector2::new(0.0, 0.0))
    }
}

/// Quaternion stored in SGE component order (X, Y, Z, W); `cgmath` wants
/// (W, X, Y, Z), so both the serde and binrw maps reorder.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
#[serde(from = "JsonQuaternion", into = "JsonQuaternion")]
pub struct SgeQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct JsonQuaternion {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

impl From<JsonQuaternion> for SgeQuaternion {
    fn from(q: JsonQuaternion) -> Self {
        SgeQuaternion(Quaternion::new(q.w, q.x, q.y, q.z))
    }
}

impl From<SgeQuaternion> for JsonQuaternion {
    fn from(q: SgeQuaternion) -> Self {
        JsonQuaternion {
            x: q.0.v.x,
            y: q.0.v.y,
            z: q.0.v.z,
            w: q.0.s,
        }
    }
}

impl SgeQuaternion {
    pub fn identity() -> Self {
        SgeQuaternion(Quaternion::new(1.0, 0.0, 0.0, 0.0))
    }

    pub fn to_slice(&self) -> [f32; 4] {
        [self.0.v.x, self.0.v.y, self.0.v.z, self.0.s]
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.0)
    }
}

/// RGBA vertex color, each channel 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct SgeColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl SgeColor {
    pub fn white() -> Self {
        SgeColor {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
        }
    }

    pub fn from_rgba_bytes(raw: [u8; 4]) -> Self {
        SgeColor {
            r: raw[0] as f32 / 255.0,
            g: raw[1] as f32 / 255.0,
            b: raw[2] as f32 / 255.0,
            a: raw[3] as f32 / 255.0,
        }
    }

    pub fn to_rgba_bytes(&self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }
}

impl Default for SgeColor {
    fn default() -> Self {
        SgeColor::white()
    }
}
