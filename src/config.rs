//! Engine configuration - attribute and tag lookup tables.
//!
//! The reconciliation core treats these tables as static data: which
//! attributes are boolean (present-or-absent), which are set as direct
//! properties instead of attributes, which tags need a namespace at
//! creation time, and which tags preserve inter-element whitespace
//! verbatim. Defaults cover the common HTML/SVG surface; callers can
//! extend or replace them before constructing an engine.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

/// The SVG element namespace.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// The xlink attribute namespace (`xlink:href` on namespaced elements).
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

bitflags! {
    /// Per-tag classification flags resolved at template compile time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TagFlags: u8 {
        /// Element must be created through the namespaced creation call.
        const NAMESPACED = 1 << 0;
        /// All whitespace inside the element is preserved as written.
        const VERBATIM = 1 << 1;
        /// Inline text flow: whitespace-only text between children
        /// collapses to a single space instead of being dropped.
        const TEXT_FLOW = 1 << 2;
    }
}

/// Boolean attributes: presence rules apply (`true` renders the attribute
/// with its own name as value, `false` removes it).
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "autofocus",
    "checked",
    "defaultchecked",
    "disabled",
    "formnovalidate",
    "indeterminate",
    "readonly",
    "required",
    "selected",
    "willvalidate",
];

/// Attributes assigned directly as properties, bypassing the attribute
/// store. Handler-like names (`on*` prefix) are always direct and are
/// matched by prefix rather than listed here.
const DIRECT_PROPERTIES: &[&str] = &["indeterminate"];

/// Tags created in the SVG namespace.
const SVG_TAGS: &[&str] = &[
    "svg",
    "altGlyph",
    "altGlyphDef",
    "altGlyphItem",
    "animate",
    "animateColor",
    "animateMotion",
    "animateTransform",
    "circle",
    "clipPath",
    "color-profile",
    "cursor",
    "defs",
    "desc",
    "ellipse",
    "feBlend",
    "feColorMatrix",
    "feComponentTransfer",
    "feComposite",
    "feConvolveMatrix",
    "feDiffuseLighting",
    "feDisplacementMap",
    "feDistantLight",
    "feFlood",
    "feFuncA",
    "feFuncB",
    "feFuncG",
    "feFuncR",
    "feGaussianBlur",
    "feImage",
    "feMerge",
    "feMergeNode",
    "feMorphology",
    "feOffset",
    "fePointLight",
    "feSpecularLighting",
    "feSpotLight",
    "feTile",
    "feTurbulence",
    "filter",
    "font",
    "font-face",
    "font-face-format",
    "font-face-name",
    "font-face-src",
    "font-face-uri",
    "foreignObject",
    "g",
    "glyph",
    "glyphRef",
    "hkern",
    "image",
    "line",
    "linearGradient",
    "marker",
    "mask",
    "metadata",
    "missing-glyph",
    "mpath",
    "path",
    "pattern",
    "polygon",
    "polyline",
    "radialGradient",
    "rect",
    "set",
    "stop",
    "switch",
    "symbol",
    "text",
    "textPath",
    "title",
    "tref",
    "tspan",
    "use",
    "view",
    "vkern",
];

/// Tags that preserve all whitespace.
const VERBATIM_TAGS: &[&str] = &["code", "pre", "textarea"];

/// Inline text-flow tags.
const TEXT_FLOW_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "data", "dfn", "em", "i", "kbd", "mark", "q",
    "rp", "rt", "rtc", "ruby", "s", "small", "span", "strong", "sub", "sup", "time", "u", "var",
    "wbr",
];

/// Lookup tables consumed by the template compiler and the attribute
/// editors.
///
/// # Example
///
/// ```ignore
/// use quilt::config::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_boolean_attribute("muted")
///     .with_verbatim_tag("listing");
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    boolean_attributes: HashSet<String>,
    direct_properties: HashSet<String>,
    namespaced_tags: HashMap<String, String>,
    verbatim_tags: HashSet<String>,
    text_flow_tags: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            boolean_attributes: BOOLEAN_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            direct_properties: DIRECT_PROPERTIES.iter().map(|s| s.to_string()).collect(),
            namespaced_tags: SVG_TAGS
                .iter()
                .map(|tag| (tag.to_string(), SVG_NAMESPACE.to_string()))
                .collect(),
            verbatim_tags: VERBATIM_TAGS.iter().map(|s| s.to_string()).collect(),
            text_flow_tags: TEXT_FLOW_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Register an additional boolean attribute (lowercase).
    pub fn with_boolean_attribute(mut self, name: &str) -> Self {
        self.boolean_attributes.insert(name.to_ascii_lowercase());
        self
    }

    /// Register an additional direct property (lowercase).
    pub fn with_direct_property(mut self, name: &str) -> Self {
        self.direct_properties.insert(name.to_ascii_lowercase());
        self
    }

    /// Register a tag that must be created in the given namespace.
    pub fn with_namespaced_tag(mut self, tag: &str, namespace: &str) -> Self {
        self.namespaced_tags.insert(tag.to_string(), namespace.to_string());
        self
    }

    /// Register a tag whose whitespace is preserved verbatim.
    pub fn with_verbatim_tag(mut self, tag: &str) -> Self {
        self.verbatim_tags.insert(tag.to_string());
        self
    }

    /// Whether presence rules apply to the attribute (lowercase key).
    pub fn is_boolean_attribute(&self, key: &str) -> bool {
        self.boolean_attributes.contains(key)
    }

    /// Whether the attribute is assigned as a direct property.
    ///
    /// Handler-like names (`on*`) are always direct.
    pub fn is_direct_property(&self, key: &str) -> bool {
        key.starts_with("on") || self.direct_properties.contains(key)
    }

    /// The creation namespace for a tag, if any.
    pub fn namespace_for(&self, tag: &str) -> Option<&str> {
        self.namespaced_tags.get(tag).map(String::as_str)
    }

    /// Resolve the classification flags for a tag.
    pub fn flags_for(&self, tag: &str) -> TagFlags {
        let mut flags = TagFlags::empty();
        if self.namespaced_tags.contains_key(tag) {
            flags |= TagFlags::NAMESPACED;
        }
        if self.verbatim_tags.contains(tag) {
            flags |= TagFlags::VERBATIM;
        }
        if self.text_flow_tags.contains(tag) {
            flags |= TagFlags::TEXT_FLOW;
        }
        flags
    }
}
