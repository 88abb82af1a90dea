/// Per-vertex inputs of the building shaders.
///
/// Component counts are part of the shader contract: the mesh pipeline
/// sizes its buffers from [`Attribute::components`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    TexCoord,
    Color,
    Filter,
    Normal,
    Id,
    Height,
}

impl Attribute {
    pub const ALL: [Attribute; 7] = [
        Attribute::Position,
        Attribute::TexCoord,
        Attribute::Color,
        Attribute::Filter,
        Attribute::Normal,
        Attribute::Id,
        Attribute::Height,
    ];

    /// Position in [`Attribute::ALL`].
    pub const fn slot(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Attribute::Position => "aPosition",
            Attribute::TexCoord => "aTexCoord",
            Attribute::Color => "aColor",
            Attribute::Filter => "aFilter",
            Attribute::Normal => "aNormal",
            Attribute::Id => "aId",
            Attribute::Height => "aHeight",
        }
    }

    pub const fn components(self) -> u32 {
        match self {
            Attribute::Position | Attribute::Color | Attribute::Normal | Attribute::Id => 3,
            Attribute::TexCoord => 2,
            Attribute::Filter => 4,
            Attribute::Height => 1,
        }
    }
}

const STANDARD_UNIFORMS: &[&str] = &[
    "uModelMatrix",
    "uViewDirOnMap",
    "uMatrix",
    "uNormalTransform",
    "uLightColor",
    "uLightDirection",
    "uLowerEdgePoint",
    "uFogDistance",
    "uFogBlurDistance",
    "uHighlightColor",
    "uHighlightId",
    "uTime",
    "uWallTexIndex",
];

const HIGH_QUALITY_UNIFORMS: &[&str] = &[
    "uFogDistance",
    "uFogBlurDistance",
    "uHighlightColor",
    "uHighlightId",
    "uLightColor",
    "uLightDirection",
    "uLowerEdgePoint",
    "uMatrix",
    "uModelMatrix",
    "uSunMatrix",
    "uShadowTexIndex",
    "uShadowTexDimensions",
    "uTime",
    "uViewDirOnMap",
    "uWallTexIndex",
];

/// Building shader program, fixed when the renderer is created.
///
/// Both variants read the same vertex attributes; the high-quality one adds
/// shadow-map inputs and drops the explicit normal transform.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    #[default]
    Standard,
    HighQuality,
}

impl ShaderVariant {
    pub fn with_shadows(shadows: bool) -> Self {
        if shadows {
            ShaderVariant::HighQuality
        } else {
            ShaderVariant::Standard
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ShaderVariant::Standard => "building shader",
            ShaderVariant::HighQuality => "quality building shader",
        }
    }

    pub const fn attributes(self) -> &'static [Attribute] {
        &Attribute::ALL
    }

    pub const fn uniforms(self) -> &'static [&'static str] {
        match self {
            ShaderVariant::Standard => STANDARD_UNIFORMS,
            ShaderVariant::HighQuality => HIGH_QUALITY_UNIFORMS,
        }
    }

    pub fn uses_shadow_map(self) -> bool {
        self.uniforms().contains(&"uShadowTexIndex")
    }
}
