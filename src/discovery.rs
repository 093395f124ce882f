//! Project descriptor reading.
//!
//! Which repositories make up the tree, and which version the tree is at, is
//! known to the build tool, not to the orchestrator. `ModuleDiscovery` is the
//! narrow boundary to that knowledge. `PomDiscovery` answers it from Maven
//! `pom.xml` files: module names from `<modules><module>`, the version from
//! `<version>` or, when absent, `<parent><version>`.

use std::fs;
use std::path::Path;

use xot::{Node, Xot};

use crate::error::{Error, Result};

/// Trait for reading project descriptors - allows mocking in tests
pub trait ModuleDiscovery: Send + Sync {
    fn has_descriptor(&self, descriptor: &Path) -> bool {
        descriptor.is_file()
    }

    /// Child repository names, in declaration order.
    fn discover(&self, descriptor: &Path) -> Result<Vec<String>>;

    /// Project version declared by the descriptor.
    fn version(&self, descriptor: &Path) -> Result<String>;
}

/// Reads Maven POM files. Namespaces are ignored, only local names count.
#[derive(Debug, Default, Clone, Copy)]
pub struct PomDiscovery;

impl ModuleDiscovery for PomDiscovery {
    fn discover(&self, descriptor: &Path) -> Result<Vec<String>> {
        let pom = Pom::load(descriptor)?;
        Ok(pom.modules())
    }

    fn version(&self, descriptor: &Path) -> Result<String> {
        let pom = Pom::load(descriptor)?;
        pom.version().ok_or_else(|| Error::Descriptor {
            path: descriptor.display().to_string(),
            message: "no <version> nor <parent><version> element".to_string(),
        })
    }
}

struct Pom {
    xot: Xot,
    project: Node,
}

impl Pom {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| descriptor_error(path, e))?;
        Self::parse(&text).map_err(|message| Error::Descriptor {
            path: path.display().to_string(),
            message,
        })
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut xot = Xot::new();
        let document = xot.parse(text).map_err(|e| e.to_string())?;
        let project = xot.document_element(document).map_err(|e| e.to_string())?;
        Ok(Self { xot, project })
    }

    fn modules(&self) -> Vec<String> {
        self.child(self.project, "modules")
            .map(|modules| {
                self.children(modules, "module")
                    .filter_map(|module| self.text(module))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn version(&self) -> Option<String> {
        self.child(self.project, "version")
            .and_then(|v| self.text(v))
            .or_else(|| {
                self.child(self.project, "parent")
                    .and_then(|parent| self.child(parent, "version"))
                    .and_then(|v| self.text(v))
            })
    }

    fn children<'a>(&'a self, parent: Node, name: &'a str) -> impl Iterator<Item = Node> + 'a {
        self.xot.children(parent).filter(move |child| {
            self.xot
                .element(*child)
                .map(|element| self.xot.local_name_str(element.name()) == name)
                .unwrap_or(false)
        })
    }

    fn child(&self, parent: Node, name: &str) -> Option<Node> {
        self.children(parent, name).next()
    }

    fn text(&self, node: Node) -> Option<String> {
        self.xot
            .text_content_str(node)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

fn descriptor_error(path: &Path, error: impl ToString) -> Error {
    Error::Descriptor {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
