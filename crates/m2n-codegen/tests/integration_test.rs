use m2n_codegen::{c_types, CodeGenerator, GeneratorOptions};
use m2n_hir::{Binder, BindingModel};
use m2n_parser::Parser;
use m2n_runtime::ElementKind;

const CORPUS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/managed/corpus.m2n"));

fn bind(source: &str) -> BindingModel {
    let assembly = Parser::new(source).unwrap().parse().unwrap();
    let model = Binder::new().bind(&assembly);
    assert!(model.errors.is_empty(), "{:?}", model.errors);
    model
}

fn generate(model: &BindingModel) -> (String, String) {
    let files = CodeGenerator::new(GeneratorOptions::default()).generate(model).unwrap();
    (files[0].contents.clone(), files[1].contents.clone())
}

const GEOMETRY: &str = r#"
    namespace Geometry {
        public enum Axis : byte { X, Y }
        public class Point {
            public Point(int x);
            public int X { get; }
            public void Move(Axis axis, ref int delta);
        }
    }
"#;

#[test]
fn test_header_layout() {
    let (header, _) = generate(&bind(GEOMETRY));
    insta::assert_snapshot!(header, @r###"
    /*
     * This is autogenerated code.
     * Do not edit this file or all your changes will be lost after re-generation.
     */
    #pragma once

    #include "m2n_support.h"

    #ifndef M2N_API
    #define M2N_API
    #endif

    #ifdef __cplusplus
    extern "C" {
    #endif

    /* Geometry.Axis */
    typedef uint8_t Geometry_Axis;
    #define Geometry_Axis_X ((Geometry_Axis)0)
    #define Geometry_Axis_Y ((Geometry_Axis)1)

    typedef struct Geometry_Point Geometry_Point;

    /* Geometry.Point */
    M2N_API Geometry_Point* Geometry_Point_new(int32_t x);
    M2N_API int32_t Geometry_Point_get_X(Geometry_Point* __object);
    M2N_API void Geometry_Point_Move(Geometry_Point* __object, Geometry_Axis axis, int32_t* delta);

    #ifdef __cplusplus
    }
    #endif
    "###);
}

#[test]
fn test_shims_pack_arguments() {
    let (_, source) = generate(&bind(GEOMETRY));

    assert!(source.starts_with("/*\n * This is autogenerated code.\n"));
    assert!(source.contains("#include \"managed.h\"\n"));

    let mv = r#"M2N_API void Geometry_Point_Move(Geometry_Point* __object, Geometry_Axis axis, int32_t* delta)
{
    M2nValue __args[3];
    M2nValue __result = {0};
    M2N_ARG(__args[0], M2N_KIND_HANDLE, handle, (void*)__object);
    M2N_ARG(__args[1], M2N_KIND_U8, u8, (uint8_t)axis);
    M2N_ARG_REF(__args[2], M2N_KIND_I32, delta);
    __m2n_call("Geometry_Point_Move", __args, 3, &__result);
}
"#;
    assert!(source.contains(mv), "{}", source);

    let ctor = r#"M2N_API Geometry_Point* Geometry_Point_new(int32_t x)
{
    M2nValue __args[1];
    M2nValue __result = {0};
    M2N_ARG(__args[0], M2N_KIND_I32, i32, x);
    __m2n_call("Geometry_Point_new", __args, 1, &__result);
    return (Geometry_Point*)__result.payload.handle;
}
"#;
    assert!(source.contains(ctor), "{}", source);
}

#[test]
fn test_corpus_prototypes() {
    let (header, source) = generate(&bind(CORPUS));

    for line in [
        "typedef struct BuiltinTypes BuiltinTypes;",
        "typedef struct _UInt8Array { M2nArray* array; } _UInt8Array;",
        "typedef struct _Int32Array { M2nArray* array; } _Int32Array;",
        "typedef struct _StringArray { M2nArray* array; } _StringArray;",
        "/* Enums.EnumFlags (flags) */",
        "typedef uint8_t Enums_EnumByte;",
        "#define Enums_EnumFlags_FlagTwo ((Enums_EnumFlags)4)",
        "/* First.Second.Third.ClassWithNestedNamespace */",
        "M2N_API const char* First_Second_Third_ClassWithNestedNamespace_ToString(First_Second_Third_ClassWithNestedNamespace* __object);",
        "M2N_API void BuiltinTypes_PassOutInt(BuiltinTypes* __object, int32_t* x);",
        "M2N_API void BuiltinTypes_PassRefInt(BuiltinTypes* __object, int32_t* x);",
        "M2N_API void BuiltinTypes_PassOutString(BuiltinTypes* __object, M2nString* x);",
        "M2N_API uint16_t BuiltinTypes_ReturnsChar(BuiltinTypes* __object);",
        "M2N_API bool Platform_get_IsWindows(void);",
        "M2N_API void Platform_set_ExitCode(int32_t value);",
        "M2N_API int32_t Properties_Query_get_UniversalAnswer(void);",
        "M2N_API Constructors_Unique* Constructors_Unique_new(void);",
        "M2N_API Constructors_Unique* Constructors_Unique_new_1(int32_t id);",
        "M2N_API Constructors_AllTypeCode* Constructors_AllTypeCode_new(bool b, uint16_t c, const char* s);",
        "M2N_API Constructors_AllTypeCode* Constructors_AllTypeCode_new_1(int8_t a, int16_t b, int32_t c, int64_t d);",
        "M2N_API Constructors_AllTypeCode* Constructors_AllTypeCode_new_3(float f, double d);",
        "M2N_API int32_t Enums_EnumTypes_PassEnumFlags(Enums_EnumFlags e);",
        "M2N_API int32_t Arrays_ArrayTypes_SumByteArray(_UInt8Array array);",
        "M2N_API _Int32Array Arrays_ArrayTypes_ReturnsIntArray(void);",
        "M2N_API Methods_Static* Methods_Static_Create(int32_t id);",
    ] {
        assert!(header.contains(line), "missing `{}`", line);
    }

    assert!(!header.contains("typedef struct Platform Platform;"));
    assert!(!header.contains("Methods_Static_new"));
    assert!(!header.contains("Methods_Static_set_Id"));

    assert!(source.contains("    M2N_ARG(__args[0], M2N_KIND_ARRAY, array, array.array);\n"));
    assert!(source.contains("    return (Enums_EnumFlags)__result.payload.i32;\n"));
    assert!(source.contains(
        "    _StringArray __array;\n    __array.array = __result.payload.array;\n    return __array;\n"
    ));
    assert!(source.contains("    __m2n_call(\"Platform_get_IsWindows\", NULL, 0, &__result);\n"));
}

#[test]
fn test_generation_is_deterministic() {
    let generator = CodeGenerator::new(GeneratorOptions::default());
    let first = generator.generate(&bind(CORPUS)).unwrap();
    let second = generator.generate(&bind(CORPUS)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_support_files() {
    let model = bind(GEOMETRY);

    let files = CodeGenerator::new(GeneratorOptions::default()).generate(&model).unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["managed.h", "managed.c", "m2n_support.h"]);

    let options = GeneratorOptions {
        library_name: "geometry".to_string(),
        generate_support_files: false,
        ..GeneratorOptions::default()
    };
    let files = CodeGenerator::new(options).generate(&model).unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["geometry.h", "geometry.c"]);
    assert!(files[0].contents.contains("#include <m2n_support.h>\n"));
    assert!(files[1].contents.contains("#include \"geometry.h\"\n"));
}

#[test]
fn test_support_header_matches_runtime_abi() {
    for kind in ElementKind::ALL {
        assert_eq!(c_types::KIND_CONSTANTS[kind.code() as usize], kind.constant());
    }

    let support = m2n_codegen::support::support_header().unwrap();
    assert!(support.contains(&format!("#define M2N_KIND_ARRAY {}\n", m2n_runtime::ffi::M2N_KIND_ARRAY)));
    assert!(support.contains(&format!("#define M2N_OK {}\n", m2n_runtime::ffi::M2N_OK)));
    assert!(support.contains(&format!(
        "#define M2N_INVALID_ARGUMENT {}\n",
        m2n_runtime::ffi::M2N_INVALID_ARGUMENT
    )));
    assert!(support.contains(&format!(
        "#define M2N_MISSING_IMPLEMENTATION {}\n",
        m2n_runtime::ffi::M2N_MISSING_IMPLEMENTATION
    )));
    assert!(support.contains("int32_t m2n_invoke(const char* symbol, M2nValue* args, size_t argc, M2nValue* result);"));
}
