use crate::c_types::KIND_CONSTANTS;
use crate::{preamble, CodegenError};
use std::fmt::Write;

pub const SUPPORT_HEADER: &str = "m2n_support.h";

const STATUS_CONSTANTS: [&str; 8] = [
    "M2N_OK",
    "M2N_NO_RUNTIME",
    "M2N_UNKNOWN_SYMBOL",
    "M2N_ARITY",
    "M2N_CONVERSION",
    "M2N_MANAGED_FAILURE",
    "M2N_MISSING_IMPLEMENTATION",
    "M2N_INVALID_ARGUMENT",
];

const DECLARATIONS: &str = r#"/* Allocate only through m2n_string_new: the runtime keeps private storage past `len`. */
typedef struct M2nString {
    char* str;
    size_t len;
} M2nString;

/* Allocate only through m2n_array_new. */
typedef struct M2nArray {
    void* data;
    size_t len;
    uint32_t element_kind;
} M2nArray;

typedef union M2nPayload {
    bool b;
    uint16_t c;
    int8_t i8;
    uint8_t u8;
    int16_t i16;
    uint16_t u16;
    int32_t i32;
    uint32_t u32;
    int64_t i64;
    uint64_t u64;
    float f32;
    double f64;
    const char* str;
    M2nArray* array;
    void* handle;
    void* ptr;
} M2nPayload;

typedef struct M2nValue {
    uint32_t kind;
    bool by_ref;
    M2nPayload payload;
} M2nValue;

#define M2N_ARG(slot, k, field, value) \
    ((slot).kind = (k), (slot).by_ref = false, (slot).payload.field = (value))
#define M2N_ARG_REF(slot, k, pointer) \
    ((slot).kind = (k), (slot).by_ref = true, (slot).payload.ptr = (void*)(pointer))

#define m2n_array_index_as(array, type, index) (*(const type*)m2n_array_index((array), (index)))

M2nString* m2n_string_new(const char* text);
void m2n_string_assign(M2nString* string, const char* text);
void m2n_string_append(M2nString* string, const char* text);
void m2n_string_free(M2nString* string);

M2nArray* m2n_array_new(uint32_t kind);
void m2n_array_append_vals(M2nArray* array, const void* values, size_t count);
size_t m2n_array_len(const M2nArray* array);
const void* m2n_array_index(const M2nArray* array, size_t index);
void m2n_array_free(M2nArray* array);

int32_t m2n_invoke(const char* symbol, M2nValue* args, size_t argc, M2nValue* result);
const char* m2n_last_error(void);
"#;

/// Declarations of the runtime's C ABI.
pub fn support_header() -> Result<String, CodegenError> {
    let mut out = String::new();
    preamble(&mut out)?;
    writeln!(out, "#pragma once")?;
    writeln!(out)?;
    writeln!(out, "#include <stdbool.h>")?;
    writeln!(out, "#include <stddef.h>")?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;
    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "extern \"C\" {{")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;

    for (code, name) in KIND_CONSTANTS.iter().enumerate() {
        writeln!(out, "#define {} {}", name, code)?;
    }
    writeln!(out)?;
    for (code, name) in STATUS_CONSTANTS.iter().enumerate() {
        writeln!(out, "#define {} {}", name, code)?;
    }
    writeln!(out)?;

    out.push_str(DECLARATIONS);
    writeln!(out)?;
    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "}}")?;
    writeln!(out, "#endif")?;
    Ok(out)
}
