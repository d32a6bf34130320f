use bon::Builder;

use crate::geometry::{Color, FloatType};

/// Number of floats of a serialized material.
pub const MATERIAL_RECORD_LEN: usize = 15;

/// Phong exponent at which next event estimation uses the glossy lobe instead of Lambert.
pub const PHONG_LIGHT_EXPONENT: FloatType = 40.0;

/// Phong exponents above this are rendered as perfect mirrors.
pub const MIRROR_EXPONENT: FloatType = 500.0;

/// Shading model selector, serialized as its numeric code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Illumination {
    Diffuse,
    Highlight,
    Dielectric,
    Other(u32),
}

impl Illumination {
    pub fn from_code(code: u32) -> Illumination {
        match code {
            1 => Illumination::Diffuse,
            2 => Illumination::Highlight,
            7 => Illumination::Dielectric,
            other => Illumination::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Illumination::Diffuse => 1,
            Illumination::Highlight => 2,
            Illumination::Dielectric => 7,
            Illumination::Other(code) => code,
        }
    }
}

/// Surface description with the usual MTL coefficients.
#[derive(Clone, Debug, PartialEq, Builder)]
pub struct Material {
    /// Specular (Phong) exponent
    #[builder(default)]
    pub ns: FloatType,
    /// Index of refraction
    #[builder(default = 1.0)]
    pub ni: FloatType,
    #[builder(default = Illumination::Diffuse)]
    pub illum: Illumination,

    #[builder(default = Color::zeros())]
    pub ka: Color,
    #[builder(default = Color::zeros())]
    pub kd: Color,
    #[builder(default = Color::zeros())]
    pub ks: Color,
    #[builder(default = Color::zeros())]
    pub ke: Color,
}

impl Material {
    pub fn diffuse(kd: Color) -> Material {
        Material::builder().kd(kd).build()
    }

    pub fn emitter(ke: Color) -> Material {
        Material::builder().ke(ke).build()
    }

    pub fn mirror() -> Material {
        Material::builder()
            .ns(1000.0)
            .ks(Color::repeat(1.0))
            .illum(Illumination::Highlight)
            .build()
    }

    pub fn glass(ni: FloatType) -> Material {
        Material::builder()
            .ni(ni)
            .ks(Color::repeat(1.0))
            .illum(Illumination::Dielectric)
            .build()
    }

    pub fn is_emissive(&self) -> bool {
        self.ke.iter().any(|c| *c > 0.0)
    }

    pub fn is_dielectric(&self) -> bool {
        self.illum == Illumination::Dielectric
    }

    pub fn is_mirror(&self) -> bool {
        self.ns > MIRROR_EXPONENT
    }

    pub fn has_highlight(&self) -> bool {
        self.ks.sum() > 0.0
    }

    /// `[Ns, Ni, illum, Ka, Kd, Ks, Ke]`
    pub fn to_record(&self) -> [FloatType; MATERIAL_RECORD_LEN] {
        let mut record = [0.0; MATERIAL_RECORD_LEN];
        record[0] = self.ns;
        record[1] = self.ni;
        record[2] = self.illum.code() as FloatType;
        for (i, color) in [&self.ka, &self.kd, &self.ks, &self.ke].into_iter().enumerate() {
            record[3 + 3 * i..6 + 3 * i].copy_from_slice(color.as_slice());
        }
        record
    }

    /// Inverse of `to_record`. Returns None if the illumination code is not a
    /// non-negative integer.
    pub fn from_record(record: &[FloatType; MATERIAL_RECORD_LEN]) -> Option<Material> {
        let illum = record[2];
        if illum < 0.0 || illum.fract() != 0.0 || illum > u32::MAX as FloatType {
            return None;
        }
        let color = |start: usize| Color::from_column_slice(&record[start..start + 3]);

        Some(Material {
            ns: record[0],
            ni: record[1],
            illum: Illumination::from_code(illum as u32),
            ka: color(3),
            kd: color(6),
            ks: color(9),
            ke: color(12),
        })
    }
}
