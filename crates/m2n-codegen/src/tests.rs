#[cfg(test)]
mod tests {
    use crate::c_types::{self, Slot};
    use crate::*;
    use m2n_ast::PrimitiveKind;
    use m2n_hir::{Binder, BindingModel, Direction, ManagedType, TypePath};
    use m2n_parser::Parser;

    fn bind(source: &str) -> BindingModel {
        let assembly = Parser::new(source).unwrap().parse().unwrap();
        Binder::new().bind(&assembly)
    }

    #[test]
    fn test_by_value_types() {
        assert_eq!(c_types::by_value(&ManagedType::Void), "void");
        assert_eq!(c_types::by_value(&ManagedType::Primitive(PrimitiveKind::Char)), "uint16_t");
        assert_eq!(c_types::by_value(&ManagedType::Primitive(PrimitiveKind::UInt64)), "uint64_t");
        assert_eq!(c_types::by_value(&ManagedType::String), "const char*");

        let path = TypePath::parse("First.Second.Widget");
        assert_eq!(c_types::by_value(&ManagedType::Object(path.clone())), "First_Second_Widget*");
        assert_eq!(c_types::by_value(&ManagedType::Enum(path)), "First_Second_Widget");

        let bytes = ManagedType::Array(Box::new(ManagedType::Primitive(PrimitiveKind::Byte)));
        assert_eq!(c_types::by_value(&bytes), "_UInt8Array");
    }

    #[test]
    fn test_out_and_ref_parameters() {
        let int = ManagedType::Primitive(PrimitiveKind::Int32);
        assert_eq!(c_types::parameter(&int, Direction::In), "int32_t");
        assert_eq!(c_types::parameter(&int, Direction::Out), "int32_t*");
        assert_eq!(c_types::parameter(&int, Direction::Ref), "int32_t*");

        assert_eq!(c_types::parameter(&ManagedType::String, Direction::In), "const char*");
        assert_eq!(c_types::parameter(&ManagedType::String, Direction::Out), "M2nString*");
        assert_eq!(c_types::parameter(&ManagedType::String, Direction::Ref), "M2nString*");

        let object = ManagedType::Object(TypePath::parse("Shapes.Circle"));
        assert_eq!(c_types::parameter(&object, Direction::Out), "Shapes_Circle**");
    }

    #[test]
    fn test_c_keyword_parameter_names() {
        assert_eq!(c_types::parameter_name("register"), "register_");
        assert_eq!(c_types::parameter_name("union"), "union_");
        assert_eq!(c_types::parameter_name("count"), "count");

        let model = bind("public static class Cpu { public static void Store(int register, int union); }");
        assert!(model.errors.is_empty(), "{:?}", model.errors);
        let generator = CodeGenerator::new(GeneratorOptions::default());
        assert_eq!(
            generator.prototype(&model.functions[0]),
            "M2N_API void Cpu_Store(int32_t register_, int32_t union_)"
        );
        let source = generator.source(&model).unwrap();
        assert!(source.contains("    M2N_ARG(__args[0], M2N_KIND_I32, i32, register_);\n"));
    }

    #[test]
    fn test_cpp_keyword_and_reserved_parameter_names() {
        for (name, escaped) in [
            ("template", "template_"),
            ("typename", "typename_"),
            ("delete", "delete_"),
            ("nullptr", "nullptr_"),
            ("constexpr", "constexpr_"),
            ("noexcept", "noexcept_"),
            ("__args", "__args_"),
            ("__result", "__result_"),
            ("_value", "_value"),
        ] {
            assert_eq!(c_types::parameter_name(name), escaped);
        }

        let model = bind(
            "public static class Tpl { public static void Use(int template, int typename, int __args, ref int __result); }",
        );
        assert!(model.errors.is_empty(), "{:?}", model.errors);
        let generator = CodeGenerator::new(GeneratorOptions::default());
        assert_eq!(
            generator.prototype(&model.functions[0]),
            "M2N_API void Tpl_Use(int32_t template_, int32_t typename_, int32_t __args_, int32_t* __result_)"
        );
        let source = generator.source(&model).unwrap();
        assert!(source.contains("    M2N_ARG(__args[2], M2N_KIND_I32, i32, __args_);\n"));
        assert!(source.contains("    M2N_ARG_REF(__args[3], M2N_KIND_I32, __result_);\n"));
    }

    #[test]
    fn test_enum_slots_use_underlying_type() {
        let model = bind(
            r#"
            namespace Colors {
                public enum Channel : ushort { Red, Green }
                public enum Mode { On }
            }
            "#,
        );
        let channel = ManagedType::Enum(TypePath::parse("Colors.Channel"));
        let mode = ManagedType::Enum(TypePath::parse("Colors.Mode"));
        assert_eq!(
            c_types::slot(&channel, &model).unwrap(),
            Slot {
                kind: "M2N_KIND_U16",
                field: "u16"
            }
        );
        assert_eq!(c_types::slot(&mode, &model).unwrap().field, "i32");

        let missing = ManagedType::Enum(TypePath::parse("Colors.Missing"));
        assert!(matches!(
            c_types::slot(&missing, &model),
            Err(CodegenError::UnknownEnum(name)) if name == "Colors.Missing"
        ));
    }

    #[test]
    fn test_enum_literals() {
        assert_eq!(c_types::enum_literal(4, PrimitiveKind::Byte), "4");
        assert_eq!(c_types::enum_literal(-3, PrimitiveKind::Int32), "-3");
        assert_eq!(c_types::enum_literal(i128::from(i32::MIN), PrimitiveKind::Int32), "INT32_MIN");
        assert_eq!(c_types::enum_literal(4_000_000_000, PrimitiveKind::UInt32), "4000000000u");
        assert_eq!(c_types::enum_literal(7, PrimitiveKind::Int64), "INT64_C(7)");
        assert_eq!(c_types::enum_literal(i128::from(i64::MIN), PrimitiveKind::Int64), "INT64_MIN");
        assert_eq!(c_types::enum_literal(i128::from(u64::MAX), PrimitiveKind::UInt64), "UINT64_C(18446744073709551615)");
    }

    #[test]
    fn test_invalid_library_name() {
        let model = bind("public class Thing { }");
        for name in ["", "my lib", "../escape", "a.b"] {
            let options = GeneratorOptions {
                library_name: name.to_string(),
                ..GeneratorOptions::default()
            };
            let result = CodeGenerator::new(options).generate(&model);
            assert!(matches!(result, Err(CodegenError::InvalidLibraryName(_))), "{:?}", name);
        }
    }

    #[test]
    fn test_static_functions_have_no_handle() {
        let model = bind("public static class Clock { public static long Now(); }");
        let generator = CodeGenerator::new(GeneratorOptions::default());
        assert_eq!(generator.prototype(&model.functions[0]), "M2N_API int64_t Clock_Now(void)");

        let header = generator.header(&model).unwrap();
        assert!(!header.contains("typedef struct Clock Clock;"));

        let source = generator.source(&model).unwrap();
        assert!(source.contains("{\n    M2nValue __result = {0};\n    __m2n_call(\"Clock_Now\", NULL, 0, &__result);\n"));
        assert!(source.contains("    return __result.payload.i64;\n"));
    }

    #[test]
    fn test_custom_api_macro() {
        let model = bind("public class Thing { public void Poke(); }");
        let options = GeneratorOptions {
            api_macro: "THING_EXPORT".to_string(),
            generate_support_files: false,
            ..GeneratorOptions::default()
        };
        let header = CodeGenerator::new(options).header(&model).unwrap();
        assert!(header.contains("#include <m2n_support.h>\n"));
        assert!(header.contains("#ifndef THING_EXPORT\n#define THING_EXPORT\n#endif\n"));
        assert!(header.contains("THING_EXPORT Thing* Thing_new(void);\n"));
        assert!(header.contains("THING_EXPORT void Thing_Poke(Thing* __object);\n"));
    }

    #[test]
    fn test_support_header_declares_abi() {
        let support = support::support_header().unwrap();
        assert!(support.starts_with("/*\n * This is autogenerated code.\n"));
        assert!(support.contains("#define M2N_KIND_VOID 0\n"));
        assert!(support.contains("#define M2N_KIND_STRING 13\n"));
        assert!(support.contains("#define M2N_MANAGED_FAILURE 5\n"));
        assert!(support.contains("typedef struct M2nString {"));
        assert!(support.contains("M2nString* m2n_string_new(const char* text);"));
        assert!(support.contains("const char* m2n_last_error(void);"));
        assert!(support.trim_end().ends_with("#endif"));
    }

    #[test]
    fn test_failure_handling_is_overridable() {
        let model = bind("public class Thing { }");
        let source = CodeGenerator::new(GeneratorOptions::default()).source(&model).unwrap();
        assert!(source.contains("#ifndef M2N_ON_FAILURE\n"));
        assert!(source.contains("        M2N_ON_FAILURE(symbol, status);\n"));
    }
}
