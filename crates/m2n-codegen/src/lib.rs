//! C code generation for the m2n bindings.
//! Emits a header, a source file of call shims and the runtime support header.

#[cfg(test)]
mod tests;

pub mod c_types;
pub mod support;

use m2n_hir::{naming, BindingModel, BoundEnum, Direction, ManagedType, NativeFunction, TypePath};
use std::fmt::Write;
use tracing::{debug, info};

pub use support::SUPPORT_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("formatting failed: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("enum '{0}' is used but was not bound")]
    UnknownEnum(String),

    #[error("invalid library name '{0}': use letters, digits, '_' or '-'")]
    InvalidLibraryName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Stem of the generated `.h`/`.c` pair.
    pub library_name: String,
    /// Emit `m2n_support.h` next to the header and include it with quotes.
    pub generate_support_files: bool,
    /// Macro prefixed to every exported function.
    pub api_macro: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            library_name: "managed".to_string(),
            generate_support_files: true,
            api_macro: "M2N_API".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

pub struct CodeGenerator {
    options: GeneratorOptions,
}

impl CodeGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn header_name(&self) -> String {
        format!("{}.h", self.options.library_name)
    }

    pub fn source_name(&self) -> String {
        format!("{}.c", self.options.library_name)
    }

    /// Generates every file for `model`. Members that failed to bind are
    /// simply absent from the model and therefore from the output.
    pub fn generate(&self, model: &BindingModel) -> Result<Vec<GeneratedFile>, CodegenError> {
        let name = &self.options.library_name;
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CodegenError::InvalidLibraryName(name.clone()));
        }

        let mut files = vec![
            GeneratedFile {
                name: self.header_name(),
                contents: self.header(model)?,
            },
            GeneratedFile {
                name: self.source_name(),
                contents: self.source(model)?,
            },
        ];
        if self.options.generate_support_files {
            files.push(GeneratedFile {
                name: SUPPORT_HEADER.to_string(),
                contents: support::support_header()?,
            });
        }

        for file in &files {
            info!(file = %file.name, bytes = file.contents.len(), "generated");
        }
        Ok(files)
    }

    pub fn header(&self, model: &BindingModel) -> Result<String, CodegenError> {
        let api = &self.options.api_macro;
        let mut out = String::new();
        preamble(&mut out)?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;
        self.include(&mut out, SUPPORT_HEADER)?;
        writeln!(out)?;
        writeln!(out, "#ifndef {}", api)?;
        writeln!(out, "#define {}", api)?;
        writeln!(out, "#endif")?;
        writeln!(out)?;
        writeln!(out, "#ifdef __cplusplus")?;
        writeln!(out, "extern \"C\" {{")?;
        writeln!(out, "#endif")?;
        writeln!(out)?;

        for bound in &model.enums {
            write_enum(&mut out, bound)?;
            writeln!(out)?;
        }

        let handles: Vec<String> = model
            .classes
            .iter()
            .filter(|class| !class.is_static)
            .map(|class| class.native_name.clone())
            .collect();
        if !handles.is_empty() {
            for handle in &handles {
                writeln!(out, "typedef struct {0} {0};", handle)?;
            }
            writeln!(out)?;
        }

        let arrays = model.array_elements();
        if !arrays.is_empty() {
            for element in arrays {
                writeln!(out, "typedef struct {0} {{ M2nArray* array; }} {0};", naming::array_typedef(element))?;
            }
            writeln!(out)?;
        }

        for class in &model.classes {
            let mut functions = model.functions_of(&class.path).peekable();
            if functions.peek().is_none() {
                continue;
            }
            writeln!(out, "/* {} */", class.path)?;
            for function in functions {
                writeln!(out, "{};", self.prototype(function))?;
            }
            writeln!(out)?;
        }

        writeln!(out, "#ifdef __cplusplus")?;
        writeln!(out, "}}")?;
        writeln!(out, "#endif")?;
        Ok(out)
    }

    pub fn source(&self, model: &BindingModel) -> Result<String, CodegenError> {
        let mut out = String::new();
        preamble(&mut out)?;
        writeln!(out, "#include \"{}\"", self.header_name())?;
        writeln!(out)?;
        writeln!(out, "#include <stdio.h>")?;
        writeln!(out, "#include <stdlib.h>")?;
        writeln!(out)?;
        out.push_str(FAILURE_HANDLING);

        for function in &model.functions {
            writeln!(out)?;
            self.shim(&mut out, function, model)?;
            debug!(symbol = %function.symbol, "emitted shim");
        }
        Ok(out)
    }

    /// `M2N_API int32_t Ns_T_Member(Ns_T* __object, int32_t x)`
    pub fn prototype(&self, function: &NativeFunction) -> String {
        let mut params = Vec::new();
        if function.takes_handle() {
            params.push(format!("{}* __object", naming::type_symbol(&function.owner)));
        }
        for param in &function.params {
            params.push(format!(
                "{} {}",
                c_types::parameter(&param.ty, param.direction),
                c_types::parameter_name(&param.name)
            ));
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        format!(
            "{} {} {}({})",
            self.options.api_macro,
            c_types::by_value(&function.return_type),
            function.symbol,
            params
        )
    }

    fn shim(&self, out: &mut String, function: &NativeFunction, model: &BindingModel) -> Result<(), CodegenError> {
        let argc = function.native_arity();
        writeln!(out, "{}", self.prototype(function))?;
        writeln!(out, "{{")?;
        if argc > 0 {
            writeln!(out, "    M2nValue __args[{}];", argc)?;
        }
        writeln!(out, "    M2nValue __result = {{0}};")?;

        let mut index = 0;
        if function.takes_handle() {
            writeln!(out, "    M2N_ARG(__args[0], M2N_KIND_HANDLE, handle, (void*)__object);")?;
            index += 1;
        }
        for param in &function.params {
            let slot = c_types::slot(&param.ty, model)?;
            let name = c_types::parameter_name(&param.name);
            match param.direction {
                Direction::In => {
                    let value = match &param.ty {
                        ManagedType::Enum(path) => format!("({}){}", enum_storage(path, model)?, name),
                        ManagedType::Object(_) => format!("(void*){}", name),
                        ManagedType::Array(_) => format!("{}.array", name),
                        _ => name,
                    };
                    writeln!(out, "    M2N_ARG(__args[{}], {}, {}, {});", index, slot.kind, slot.field, value)?;
                }
                Direction::Out | Direction::Ref => {
                    writeln!(out, "    M2N_ARG_REF(__args[{}], {}, {});", index, slot.kind, name)?;
                }
            }
            index += 1;
        }

        let args = if argc > 0 { "__args" } else { "NULL" };
        writeln!(
            out,
            "    __m2n_call(\"{}\", {}, {}, &__result);",
            function.symbol, args, argc
        )?;

        let ret = &function.return_type;
        match ret {
            ManagedType::Void => {}
            ManagedType::Primitive(_) | ManagedType::String => {
                writeln!(out, "    return __result.payload.{};", c_types::slot(ret, model)?.field)?;
            }
            ManagedType::Enum(_) => {
                writeln!(
                    out,
                    "    return ({})__result.payload.{};",
                    c_types::by_value(ret),
                    c_types::slot(ret, model)?.field
                )?;
            }
            ManagedType::Object(_) => {
                writeln!(out, "    return ({})__result.payload.handle;", c_types::by_value(ret))?;
            }
            ManagedType::Array(_) => {
                writeln!(out, "    {} __array;", c_types::by_value(ret))?;
                writeln!(out, "    __array.array = __result.payload.array;")?;
                writeln!(out, "    return __array;")?;
            }
        }
        writeln!(out, "}}")?;
        Ok(())
    }

    fn include(&self, out: &mut String, header: &str) -> Result<(), CodegenError> {
        if self.options.generate_support_files {
            writeln!(out, "#include \"{}\"", header)?;
        } else {
            writeln!(out, "#include <{}>", header)?;
        }
        Ok(())
    }
}

const FAILURE_HANDLING: &str = r#"/* Define M2N_ON_FAILURE to handle failed calls differently. Results are zeroed on failure. */
#ifndef M2N_ON_FAILURE
static void __m2n_abort(const char* symbol, int32_t status)
{
    const char* message = m2n_last_error();
    fprintf(stderr, "%s failed with status %d: %s\n", symbol, (int)status, message ? message : "unknown error");
    abort();
}

#define M2N_ON_FAILURE(symbol, status) __m2n_abort((symbol), (status))
#endif

static void __m2n_call(const char* symbol, M2nValue* args, size_t argc, M2nValue* result)
{
    int32_t status = m2n_invoke(symbol, args, argc, result);
    if (status != M2N_OK)
        M2N_ON_FAILURE(symbol, status);
}
"#;

pub(crate) fn preamble(out: &mut String) -> Result<(), CodegenError> {
    writeln!(out, "/*")?;
    writeln!(out, " * This is autogenerated code.")?;
    writeln!(out, " * Do not edit this file or all your changes will be lost after re-generation.")?;
    writeln!(out, " */")?;
    Ok(())
}

fn write_enum(out: &mut String, bound: &BoundEnum) -> Result<(), CodegenError> {
    if bound.is_flags {
        writeln!(out, "/* {} (flags) */", bound.path)?;
    } else {
        writeln!(out, "/* {} */", bound.path)?;
    }
    writeln!(out, "typedef {} {};", c_types::primitive(bound.underlying), bound.native_name)?;
    for item in &bound.items {
        writeln!(
            out,
            "#define {} (({}){})",
            item.symbol,
            bound.native_name,
            c_types::enum_literal(item.value, bound.underlying)
        )?;
    }
    Ok(())
}

fn enum_storage(path: &TypePath, model: &BindingModel) -> Result<&'static str, CodegenError> {
    model
        .enumeration(path)
        .map(|bound| c_types::primitive(bound.underlying))
        .ok_or_else(|| CodegenError::UnknownEnum(path.dotted()))
}
