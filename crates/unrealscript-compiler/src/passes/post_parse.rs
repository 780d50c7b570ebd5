//! End of pass 1: final layout and the class flags derived from it.

use unrealscript_core::{ClassFlags, FunctionFlags, PropertyFlags, StructId};
use unrealscript_registry::layout;

use crate::context::{CompilerContext, Result};

impl<'a> CompilerContext<'a> {
    /// Link the class, size every function's parameters and check the
    /// class against what the host expects of it.
    pub(crate) fn post_parse(&mut self) -> Result<()> {
        let class = self.class;
        layout::link(self.registry, class);
        self.size_parameters(class);
        self.derive_class_flags(class);

        let data = self.registry.class_data(class);
        let needs_config = data.is_some_and(|data| data.flags.contains(ClassFlags::CONFIG) && data.config_name.is_none());
        if needs_config {
            let inherited = self
                .registry
                .super_class(class)
                .and_then(|parent| self.registry.class_data(parent))
                .and_then(|data| data.config_name.clone());
            match inherited {
                Some(name) => {
                    if let Some(data) = self.registry.class_data_mut(class) {
                        data.config_name = Some(name);
                    }
                }
                None => {
                    return Err(self.class_error(
                        "Classes with config / globalconfig member variables need to specify config file.",
                    ));
                }
            }
        }

        self.check_native_size(class)
    }

    /// `parms_size` and `return_value_offset` of every function in `scope`
    /// and its states.
    fn size_parameters(&mut self, scope: StructId) {
        let children: Vec<StructId> = self.registry.struct_def(scope).own_structs().collect();
        for child in children {
            let def = self.registry.struct_def(child);
            if def.is_state() {
                self.size_parameters(child);
                continue;
            }
            if !def.is_function() {
                continue;
            }

            let mut parms_size = 0;
            let mut return_value_offset = None;
            for id in def.own_properties() {
                let property = self.registry.property(id);
                if !property.is_parameter() {
                    continue;
                }
                let end = property.offset + layout::property_size(self.registry, &property.ty);
                parms_size = parms_size.max(end);
                if property.is_return_value() {
                    return_value_offset = Some(property.offset as u16);
                }
            }
            if let Some(function) = self.registry.struct_mut(child).as_function_mut() {
                function.parms_size = parms_size as u16;
                function.return_value_offset = return_value_offset;
            }
        }
    }

    fn derive_class_flags(&mut self, class: StructId) {
        let mut derived = ClassFlags::empty();
        for id in self.registry.struct_def(class).own_properties() {
            let flags = self.registry.property(id).flags();
            if flags.contains(PropertyFlags::LOCALIZED) {
                derived |= ClassFlags::LOCALIZED;
            }
            if flags.intersects(PropertyFlags::CONFIG | PropertyFlags::GLOBAL_CONFIG) {
                derived |= ClassFlags::CONFIG;
            }
            if flags.contains(PropertyFlags::COMPONENT) {
                derived |= ClassFlags::HAS_COMPONENTS;
            }
        }
        self.set_class_flags(class, derived);
    }

    fn check_native_size(&self, class: StructId) -> Result<()> {
        let def = self.registry.struct_def(class);
        if !def.class_flags().contains(ClassFlags::NATIVE) {
            return Ok(());
        }
        let Some(expected) = self.options.native_size(&self.class_name) else {
            return Ok(());
        };
        let alignment = def.min_alignment.max(1);
        let script = def.properties_size.div_ceil(alignment) * alignment;
        if script != expected {
            return Err(self.class_error(format!(
                "Native class {} size mismatch (script {script}, C++ {expected})",
                self.class_name
            )));
        }
        Ok(())
    }
}

/// Whether `flags` describe a function that carries code of its own.
pub(crate) fn has_script_body(flags: FunctionFlags) -> bool {
    flags.contains(FunctionFlags::DEFINED) && !flags.contains(FunctionFlags::NATIVE)
}

#[cfg(test)]
mod tests {
    use super::super::tests::PassFixture;
    use super::*;
    use crate::options::CompilerOptions;

    fn parse_ok(fixture: &mut PassFixture, source: &str) -> StructId {
        let class = fixture.class("Test", None, source);
        let output = fixture.parse(class);
        assert!(output.is_success(), "{:?}", output.errors);
        class
    }

    #[test]
    fn parameters_are_sized() {
        let mut fixture = PassFixture::new();
        let class = parse_ok(&mut fixture, "class Test; function int F(byte A, int B, optional float C);");
        let f = fixture.struct_field(class, "F");
        let data = fixture.registry.struct_def(f).as_function().unwrap();
        // A at 0, B at 4, C at 8, the return value at 12.
        assert_eq!(data.parms_size, 16);
        assert_eq!(data.return_value_offset, Some(12));
    }

    #[test]
    fn state_functions_are_sized() {
        let mut fixture = PassFixture::new();
        let class = parse_ok(&mut fixture, "class Test; state Idle { function F(int A, int B); }");
        let idle = fixture.struct_field(class, "Idle");
        let f = fixture.struct_field(idle, "F");
        let data = fixture.registry.struct_def(f).as_function().unwrap();
        assert_eq!(data.parms_size, 8);
        assert_eq!(data.return_value_offset, None);
    }

    #[test]
    fn flags_follow_properties() {
        let mut fixture = PassFixture::new();
        let class = parse_ok(&mut fixture, "class Test config(Game); var config int A; var localized string B;");
        let flags = fixture.flags(class);
        assert!(flags.contains(ClassFlags::CONFIG | ClassFlags::LOCALIZED | ClassFlags::PARSED));
    }

    #[test]
    fn config_variables_need_a_config_file() {
        let mut fixture = PassFixture::new();
        let class = fixture.class("Test", None, "class Test; var config int A;");
        let output = fixture.parse(class);
        assert_eq!(
            output.errors[0].message(),
            "Classes with config / globalconfig member variables need to specify config file."
        );
        assert!(!fixture.flags(class).contains(ClassFlags::PARSED));
    }

    #[test]
    fn config_file_is_inherited() {
        let mut fixture = PassFixture::new();
        let base = fixture.class("Base", None, "class Base config(Game);");
        assert!(fixture.parse(base).is_success());
        let test = fixture.class("Test", Some("Base"), "class Test extends Base; var config int A;");
        assert!(fixture.parse(test).is_success());
        let config = fixture.registry.class_data(test).unwrap().config_name.clone();
        assert_eq!(config.map(|name| name.to_string()), Some("Game".to_string()));
    }

    #[test]
    fn native_size_mismatch_is_class_fatal() {
        let options = CompilerOptions::new().with_native_size("Test", 12);
        let mut fixture = PassFixture::with_options(options);
        let class = fixture.class("Test", None, "class Test native; var int A; var int B;");
        let output = fixture.parse(class);
        let message = output.errors[0].message();
        assert_eq!(message, "Native class Test size mismatch (script 8, C++ 12)");
    }

    #[test]
    fn native_size_match_passes() {
        let options = CompilerOptions::new().with_native_size("Test", 8);
        let mut fixture = PassFixture::with_options(options);
        let class = fixture.class("Test", None, "class Test native; var int A; var int B;");
        assert!(fixture.parse(class).is_success());
    }

    #[test]
    fn script_bodies() {
        assert!(has_script_body(FunctionFlags::DEFINED));
        assert!(!has_script_body(FunctionFlags::DEFINED | FunctionFlags::NATIVE));
        assert!(!has_script_body(FunctionFlags::empty()));
    }
}
