//! Reference fonts and font families.
//!
//! A [`ReferenceFont`] yields outlines for characters in the same y-down
//! coordinate convention the rasterizer expects from unknown glyphs. Binary
//! TrueType/OpenType files are read with `ttf-parser`; tests and callers
//! without font files use the in-memory [`OutlineFont`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kurbo::BezPath;
use raster::EmBox;
use tracing::{debug, warn};
use ttf_parser::{name_id, Face, OutlineBuilder};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

use crate::error::{CatalogError, FontLoadError};
use crate::style::Style;

/// Source of reference outlines for one style of a family.
pub trait ReferenceFont: Send + Sync + fmt::Debug {
    /// Human-readable font name, for logs and errors.
    fn name(&self) -> &str;

    /// Version string reported by the font, if any.
    fn version(&self) -> Option<String> {
        None
    }

    /// Stable content fingerprint; changes whenever any outline may change.
    fn fingerprint(&self) -> u64;

    /// Every character the font maps, ascending.
    fn characters(&self) -> Vec<char>;

    /// Outline for `character` in y-down units, or `None` when the font has
    /// no glyph or the glyph draws nothing.
    fn outline(&self, character: char) -> Option<BezPath>;

    /// Outline for a glyph looked up by its PostScript glyph name.
    fn outline_by_name(&self, glyph_name: &str) -> Option<BezPath>;

    /// Em square the outlines are drawn in.
    fn em_box(&self) -> EmBox {
        EmBox::default()
    }

    /// Horizontal advance of `character` in outline units, when known.
    fn advance(&self, _character: char) -> Option<f32> {
        None
    }
}

/// Collects ttf-parser outline callbacks into a y-down kurbo path.
struct FlippedPathBuilder {
    path: BezPath,
}

impl OutlineBuilder for FlippedPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to((f64::from(x), -f64::from(y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to((f64::from(x), -f64::from(y)));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.path.quad_to(
            (f64::from(x1), -f64::from(y1)),
            (f64::from(x), -f64::from(y)),
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.path.curve_to(
            (f64::from(x1), -f64::from(y1)),
            (f64::from(x2), -f64::from(y2)),
            (f64::from(x), -f64::from(y)),
        );
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}

/// A TrueType/OpenType font held in memory.
///
/// The face is re-parsed for every outline request. Parsing only reads the
/// table directory, and it keeps the type free of self-references so it can
/// be shared across worker threads.
pub struct TtfFont {
    name: String,
    version: Option<String>,
    data: Vec<u8>,
    fingerprint: u64,
    characters: Vec<char>,
    glyph_names: HashMap<String, u16>,
    em: EmBox,
}

impl TtfFont {
    pub fn open(path: &Path) -> Result<Self, FontLoadError> {
        let data = fs::read(path).map_err(|err| FontLoadError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_bytes(path, data)
    }

    /// Parse font bytes; `origin` is only used in error messages and as the
    /// fallback name.
    pub fn from_bytes(origin: &Path, data: Vec<u8>) -> Result<Self, FontLoadError> {
        let (name, version, characters, glyph_names, em) = {
            let face = Face::parse(&data, 0).map_err(|err| FontLoadError::Parse {
                path: origin.to_path_buf(),
                message: err.to_string(),
            })?;

            let name = font_name(&face, name_id::FULL_NAME).unwrap_or_else(|| {
                origin
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| origin.display().to_string())
            });
            let version = font_name(&face, name_id::VERSION);

            let mut characters = BTreeSet::new();
            if let Some(cmap) = face.tables().cmap {
                for subtable in cmap.subtables {
                    if !subtable.is_unicode() {
                        continue;
                    }
                    subtable.codepoints(|cp| {
                        if let Some(c) = char::from_u32(cp) {
                            characters.insert(c);
                        }
                    });
                }
            }
            let characters: Vec<char> = characters
                .into_iter()
                .filter(|&c| face.glyph_index(c).is_some())
                .collect();

            let mut glyph_names = HashMap::new();
            for id in 0..face.number_of_glyphs() {
                if let Some(glyph_name) = face.glyph_name(ttf_parser::GlyphId(id)) {
                    glyph_names.entry(glyph_name.to_string()).or_insert(id);
                }
            }
            // Outlines are flipped around the baseline, so the ascender
            // line sits at y = -ascender.
            let em = EmBox::from_ascender(f32::from(face.units_per_em()), f32::from(face.ascender()))
                .map_err(|err| FontLoadError::Parse {
                    path: origin.to_path_buf(),
                    message: err.to_string(),
                })?;
            (name, version, characters, glyph_names, em)
        };

        if characters.is_empty() {
            return Err(FontLoadError::Parse {
                path: origin.to_path_buf(),
                message: "font maps no unicode characters".into(),
            });
        }

        Ok(Self {
            name,
            version,
            fingerprint: xxh3_64(&data),
            data,
            characters,
            glyph_names,
            em,
        })
    }

    fn outline_of(&self, glyph: ttf_parser::GlyphId) -> Option<BezPath> {
        let face = Face::parse(&self.data, 0).ok()?;
        let mut builder = FlippedPathBuilder {
            path: BezPath::new(),
        };
        face.outline_glyph(glyph, &mut builder)?;
        Some(builder.path)
    }
}

fn font_name(face: &Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id && name.is_unicode())
        .find_map(|name| name.to_string())
}

impl fmt::Debug for TtfFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtfFont")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("bytes", &self.data.len())
            .field("characters", &self.characters.len())
            .finish()
    }
}

impl ReferenceFont for TtfFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn characters(&self) -> Vec<char> {
        self.characters.clone()
    }

    fn outline(&self, character: char) -> Option<BezPath> {
        let face = Face::parse(&self.data, 0).ok()?;
        let glyph = face.glyph_index(character)?;
        self.outline_of(glyph)
    }

    fn outline_by_name(&self, glyph_name: &str) -> Option<BezPath> {
        let id = *self.glyph_names.get(glyph_name)?;
        self.outline_of(ttf_parser::GlyphId(id))
    }

    fn em_box(&self) -> EmBox {
        self.em
    }

    fn advance(&self, character: char) -> Option<f32> {
        let face = Face::parse(&self.data, 0).ok()?;
        let glyph = face.glyph_index(character)?;
        face.glyph_hor_advance(glyph).map(f32::from)
    }
}

/// In-memory font built from SVG path data, already in y-down units.
///
/// The em square defaults to [`EmBox::default`]: 1000 units with its top
/// edge at `y = 0`.
#[derive(Debug, Clone, Default)]
pub struct OutlineFont {
    name: String,
    version: Option<String>,
    em: EmBox,
    glyphs: BTreeMap<char, BezPath>,
    advances: BTreeMap<char, f32>,
    glyph_names: BTreeMap<String, char>,
}

impl OutlineFont {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_em(mut self, em: EmBox) -> Self {
        self.em = em;
        self
    }

    /// Record the horizontal advance of `character`.
    pub fn with_advance(mut self, character: char, advance: f32) -> Self {
        self.advances.insert(character, advance);
        self
    }

    /// Add (or replace) the outline for `character`.
    pub fn with_glyph(mut self, character: char, svg_path: &str) -> Result<Self, FontLoadError> {
        self.insert(character, svg_path)?;
        Ok(self)
    }

    /// Add the outline for `character` and register it under `glyph_name`.
    pub fn with_named_glyph(
        mut self,
        character: char,
        glyph_name: impl Into<String>,
        svg_path: &str,
    ) -> Result<Self, FontLoadError> {
        self.insert(character, svg_path)?;
        self.glyph_names.insert(glyph_name.into(), character);
        Ok(self)
    }

    pub fn insert(&mut self, character: char, svg_path: &str) -> Result<(), FontLoadError> {
        let path = BezPath::from_svg(svg_path.trim()).map_err(|err| {
            FontLoadError::InvalidOutline {
                font: self.name.clone(),
                character,
                message: err.to_string(),
            }
        })?;
        self.glyphs.insert(character, path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl ReferenceFont for OutlineFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(self.name.as_bytes());
        hasher.update(&self.em.units_per_em.to_le_bytes());
        hasher.update(&self.em.top.to_le_bytes());
        for (character, path) in &self.glyphs {
            hasher.update(&u32::from(*character).to_le_bytes());
            hasher.update(path.to_svg().as_bytes());
            if let Some(advance) = self.advances.get(character) {
                hasher.update(&advance.to_le_bytes());
            }
        }
        hasher.digest()
    }

    fn characters(&self) -> Vec<char> {
        self.glyphs.keys().copied().collect()
    }

    fn outline(&self, character: char) -> Option<BezPath> {
        self.glyphs.get(&character).cloned()
    }

    fn outline_by_name(&self, glyph_name: &str) -> Option<BezPath> {
        let character = self.glyph_names.get(glyph_name)?;
        self.outline(*character)
    }

    fn em_box(&self) -> EmBox {
        self.em
    }

    fn advance(&self, character: char) -> Option<f32> {
        self.advances.get(&character).copied()
    }
}

/// Font file locations for each style of one family.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontPaths {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub italic: Option<PathBuf>,
    pub bold_italic: Option<PathBuf>,
}

impl FontPaths {
    pub fn get(&self, style: Style) -> Option<&PathBuf> {
        match style {
            Style::Regular => self.regular.as_ref(),
            Style::Bold => self.bold.as_ref(),
            Style::Italic => self.italic.as_ref(),
            Style::BoldItalic => self.bold_italic.as_ref(),
        }
    }

    pub fn set(&mut self, style: Style, path: PathBuf) {
        let slot = match style {
            Style::Regular => &mut self.regular,
            Style::Bold => &mut self.bold,
            Style::Italic => &mut self.italic,
            Style::BoldItalic => &mut self.bold_italic,
        };
        *slot = Some(path);
    }

    pub fn is_empty(&self) -> bool {
        Style::ALL.iter().all(|s| self.get(*s).is_none())
    }
}

/// The styles of one reference font family that could actually be loaded.
#[derive(Debug, Clone)]
pub struct FontFamily {
    name: String,
    styles: BTreeMap<Style, Arc<dyn ReferenceFont>>,
    load_errors: Vec<FontLoadError>,
}

impl FontFamily {
    /// Load every style listed in `paths`.
    ///
    /// Styles without a path or whose file cannot be read are logged and
    /// recorded in [`FontFamily::load_errors`]; only a family with no usable
    /// style at all is an error.
    pub fn load(name: impl Into<String>, paths: &FontPaths) -> Result<Self, CatalogError> {
        let name = name.into();
        let mut styles: BTreeMap<Style, Arc<dyn ReferenceFont>> = BTreeMap::new();
        let mut load_errors = Vec::new();

        for style in Style::ALL {
            let result = match paths.get(style) {
                Some(path) => TtfFont::open(path),
                None => Err(FontLoadError::MissingStyle {
                    family: name.clone(),
                    style,
                }),
            };
            match result {
                Ok(font) => {
                    debug!(family = %name, style = %style, font = %font.name(), "font_style_loaded");
                    styles.insert(style, Arc::new(font));
                }
                Err(err) => {
                    warn!(family = %name, style = %style, error = %err, "font_style_unavailable");
                    load_errors.push(err);
                }
            }
        }

        Self::finish(name, styles, load_errors)
    }

    /// Assemble a family from already-loaded fonts.
    pub fn from_fonts<I>(name: impl Into<String>, fonts: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (Style, Arc<dyn ReferenceFont>)>,
    {
        let name = name.into();
        let styles: BTreeMap<Style, Arc<dyn ReferenceFont>> = fonts.into_iter().collect();
        let load_errors = Style::ALL
            .iter()
            .filter(|style| !styles.contains_key(style))
            .map(|&style| FontLoadError::MissingStyle {
                family: name.clone(),
                style,
            })
            .collect();
        Self::finish(name, styles, load_errors)
    }

    /// Find a family in `dir` by file name and load it.
    ///
    /// Files are grouped by the part of their stem before the last `-` or
    /// `_`, and the suffix selects the style (`Serif-Bold.ttf`). A stem
    /// without a recognised suffix is the family's regular style. With a
    /// `hint`, the family whose name matches it (ignoring case, spaces and
    /// punctuation) is chosen; otherwise the first family, by name, that has
    /// a regular style.
    pub fn discover(dir: &Path, hint: Option<&str>) -> Result<Self, CatalogError> {
        let families = scan_font_dir(dir)?;
        if families.is_empty() {
            return Err(CatalogError::NoFamilies {
                dir: dir.to_path_buf(),
            });
        }

        let chosen = match hint {
            Some(hint) => {
                let wanted = family_key(hint);
                families
                    .iter()
                    .find(|(family, _)| family_key(family) == wanted)
                    .ok_or_else(|| CatalogError::FamilyNotFound {
                        family: hint.to_string(),
                        dir: dir.to_path_buf(),
                    })?
            }
            None => families
                .iter()
                .find(|(_, paths)| paths.regular.is_some())
                .or_else(|| families.iter().next())
                .ok_or_else(|| CatalogError::NoFamilies {
                    dir: dir.to_path_buf(),
                })?,
        };

        debug!(dir = %dir.display(), family = %chosen.0, "font_family_discovered");
        Self::load(chosen.0.clone(), chosen.1)
    }

    fn finish(
        name: String,
        styles: BTreeMap<Style, Arc<dyn ReferenceFont>>,
        load_errors: Vec<FontLoadError>,
    ) -> Result<Self, CatalogError> {
        if styles.is_empty() {
            return Err(CatalogError::NoUsableStyle { family: name });
        }
        Ok(Self {
            name,
            styles,
            load_errors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loaded styles, in priority order.
    pub fn styles(&self) -> Vec<Style> {
        self.styles.keys().copied().collect()
    }

    pub fn font(&self, style: Style) -> Option<&Arc<dyn ReferenceFont>> {
        self.styles.get(&style)
    }

    pub fn has_style(&self, style: Style) -> bool {
        self.styles.contains_key(&style)
    }

    /// Why each absent style is absent.
    pub fn load_errors(&self) -> &[FontLoadError] {
        &self.load_errors
    }

    /// Version string of the regular style, else of the first loaded style.
    pub fn version(&self) -> Option<String> {
        self.styles
            .get(&Style::Regular)
            .or_else(|| self.styles.values().next())
            .and_then(|font| font.version())
    }

    /// Fingerprint over the family name and every loaded style's content.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(self.name.as_bytes());
        for (style, font) in &self.styles {
            hasher.update(&[style.priority()]);
            hasher.update(&font.fingerprint().to_le_bytes());
        }
        hasher.digest()
    }
}

/// Lower-cased alphanumerics only, so `Open Sans` matches `OpenSans`.
fn family_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a font file stem into `(family, style)`.
fn split_stem(stem: &str) -> (String, Style) {
    if let Some(idx) = stem.rfind(['-', '_']) {
        let (family, suffix) = (&stem[..idx], &stem[idx + 1..]);
        if let Some(style) = Style::from_file_suffix(suffix) {
            if !family.is_empty() {
                return (family.to_string(), style);
            }
        }
    }
    (stem.to_string(), Style::Regular)
}

fn scan_font_dir(dir: &Path) -> Result<BTreeMap<String, FontPaths>, CatalogError> {
    let read = fs::read_dir(dir).map_err(|err| FontLoadError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut files: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        })
        .collect();
    files.sort();

    let mut families: BTreeMap<String, FontPaths> = BTreeMap::new();
    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let (family, style) = split_stem(stem);
        let paths = families.entry(family.clone()).or_default();
        if paths.get(style).is_some() {
            debug!(family = %family, style = %style, path = %path.display(), "font_file_ignored");
            continue;
        }
        paths.set(style, path);
    }
    Ok(families)
}
