//! Module loader for the sandbox. It never touches the filesystem or network.
//!
//! The template itself is handed to the runtime as in-memory code. Every
//! `import` it contains, whatever the specifier, resolves to a single inert
//! module that re-exports the capability globals of the current document
//! kind. `import { Text } from "@react-email/components"` therefore binds the
//! sandbox's own `Text`, and importing a name the kind doesn't provide fails
//! at link time.

use crate::capabilities::CapabilitySet;
use crate::compiler::{JSX_FACTORY, JSX_FRAGMENT};
use deno_core::{
    anyhow::{anyhow, Error},
    ModuleLoadResponse, ModuleLoader, ModuleSource, ModuleSourceCode, ModuleSpecifier,
    ModuleType, RequestedModuleType, ResolutionKind,
};

/// The one module every import resolves to.
pub(crate) const INERT_SPECIFIER: &str = "inert:capabilities";

pub struct InertLoader {
    template: ModuleSpecifier,
    inert: ModuleSpecifier,
    inert_source: String,
}

impl InertLoader {
    pub fn new(template: ModuleSpecifier, capabilities: &CapabilitySet) -> Result<Self, Error> {
        let inert = ModuleSpecifier::parse(INERT_SPECIFIER)
            .map_err(|e| anyhow!("Invalid inert module specifier: {}", e))?;
        Ok(Self {
            template,
            inert,
            inert_source: inert_module_source(capabilities),
        })
    }
}

/// Source of the inert module: named exports for every capability, the JSX
/// factory, and a default export shaped like a component library namespace
/// (`React.createElement`, `React.Fragment`).
fn inert_module_source(capabilities: &CapabilitySet) -> String {
    let names: Vec<&str> = capabilities.names().collect();
    let mut source = String::new();
    for name in names.iter().copied().chain([JSX_FACTORY, JSX_FRAGMENT]) {
        source.push_str(&format!("export const {name} = globalThis.{name};\n"));
    }
    source.push_str(&format!("export const createElement = globalThis.{JSX_FACTORY};\n"));
    source.push_str("export default Object.freeze({ ");
    for name in &names {
        source.push_str(&format!("{name}, "));
    }
    source.push_str(&format!("{JSX_FRAGMENT}, {JSX_FACTORY}, createElement }});\n"));
    source
}

impl ModuleLoader for InertLoader {
    fn resolve(
        &self,
        specifier: &str,
        _referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, Error> {
        if specifier == self.template.as_str() {
            return Ok(self.template.clone());
        }
        // Every other specifier, relative, bare, remote or absolute, is inert.
        Ok(self.inert.clone())
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        if *module_specifier != self.inert {
            return ModuleLoadResponse::Sync(Err(anyhow!("Module loading is disabled in templates")));
        }

        ModuleLoadResponse::Sync(Ok(ModuleSource::new(
            ModuleType::JavaScript,
            ModuleSourceCode::String(self.inert_source.clone().into()),
            module_specifier,
            None,
        )))
    }
}
