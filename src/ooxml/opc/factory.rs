//! Part construction and dispatch.
//!
//! [`PartFactory`] decides which [`Part`] kind a loaded part becomes. An optional selector,
//! which sees both the content type and the relationship type the part was reached through,
//! is consulted first; then the content-type table; then [`BlobPart`] as the fallback.

use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::part::{BlobPart, ImagePart, Part, XmlPart};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a part from `(partname, content type, relationship type, blob)`.
pub type PartConstructor =
    Arc<dyn Fn(PackURI, &str, &str, Vec<u8>) -> Result<Box<dyn Part>> + Send + Sync>;

/// Picks a constructor from `(content type, relationship type)`, or defers to the table.
pub type PartSelector = Arc<dyn Fn(&str, &str) -> Option<PartConstructor> + Send + Sync>;

/// Registry mapping content types to part constructors.
#[derive(Clone, Default)]
pub struct PartFactory {
    selector: Option<PartSelector>,
    constructors: HashMap<String, PartConstructor>,
}

impl PartFactory {
    /// An empty factory: every part loads as a [`BlobPart`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with [`XmlPart`] registered for the common XML content types and
    /// [`image_selector`] installed.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        let xml: PartConstructor = Arc::new(xml_part);
        for content_type in [
            ct::XML,
            ct::OPC_CORE_PROPERTIES,
            ct::OFC_EXTENDED_PROPERTIES,
            ct::OFC_CUSTOM_PROPERTIES,
            ct::OFC_THEME,
            ct::WML_DOCUMENT_MAIN,
            ct::WML_STYLES,
            ct::WML_SETTINGS,
            ct::WML_FONT_TABLE,
            ct::WML_NUMBERING,
            ct::WML_HEADER,
            ct::WML_FOOTER,
        ] {
            factory.register(content_type, Arc::clone(&xml));
        }
        factory.set_selector(Arc::new(image_selector));
        factory
    }

    /// Register a constructor for a content type, replacing any earlier one.
    pub fn register(&mut self, content_type: &str, constructor: PartConstructor) -> &mut Self {
        self.constructors.insert(content_type.to_string(), constructor);
        self
    }

    /// Install the selector consulted before the content-type table.
    pub fn set_selector(&mut self, selector: PartSelector) -> &mut Self {
        self.selector = Some(selector);
        self
    }

    pub fn clear_selector(&mut self) -> &mut Self {
        self.selector = None;
        self
    }

    /// Whether a constructor is registered for `content_type`.
    pub fn is_registered(&self, content_type: &str) -> bool {
        self.constructors.contains_key(content_type)
    }

    /// Build a part.
    ///
    /// Fails only when the chosen constructor rejects the blob; the error names the part.
    /// The [`BlobPart`] fallback never fails.
    pub fn load(
        &self,
        partname: PackURI,
        content_type: &str,
        reltype: &str,
        blob: Vec<u8>,
    ) -> Result<Box<dyn Part>> {
        let selected = self
            .selector
            .as_ref()
            .and_then(|select| select(content_type, reltype));

        let constructor = match selected.as_ref() {
            Some(constructor) => constructor,
            None => match self.constructors.get(content_type) {
                Some(constructor) => constructor,
                None => {
                    return Ok(Box::new(BlobPart::load(partname, content_type.to_string(), blob)));
                },
            },
        };

        let name = partname.to_string();
        constructor(partname, content_type, reltype, blob).map_err(|source| {
            OpcError::PartConstruction {
                partname: name,
                source: Box::new(source),
            }
        })
    }
}

impl std::fmt::Debug for PartFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut content_types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        content_types.sort_unstable();
        f.debug_struct("PartFactory")
            .field("selector", &self.selector.is_some())
            .field("content_types", &content_types)
            .finish()
    }
}

/// Constructor for [`XmlPart`].
pub fn xml_part(
    partname: PackURI,
    content_type: &str,
    _reltype: &str,
    blob: Vec<u8>,
) -> Result<Box<dyn Part>> {
    Ok(Box::new(XmlPart::load(partname, content_type.to_string(), blob)?))
}

/// Constructor for [`ImagePart`].
pub fn image_part(
    partname: PackURI,
    content_type: &str,
    _reltype: &str,
    blob: Vec<u8>,
) -> Result<Box<dyn Part>> {
    Ok(Box::new(ImagePart::load(partname, content_type.to_string(), blob)))
}

/// Any `image/*` content reached through an image relationship is an [`ImagePart`],
/// whatever the content-type table says.
pub fn image_selector(content_type: &str, reltype: &str) -> Option<PartConstructor> {
    if reltype == rt::IMAGE && content_type.starts_with("image/") {
        let constructor: PartConstructor = Arc::new(image_part);
        Some(constructor)
    } else {
        None
    }
}
