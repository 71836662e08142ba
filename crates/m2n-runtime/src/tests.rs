#[cfg(test)]
mod tests {
    use crate::ffi::*;
    use crate::*;
    use m2n_hir::{Binder, TypePath};
    use m2n_parser::Parser;
    use std::cell::Cell;
    use std::ffi::{CStr, CString};
    use std::os::raw::{c_char, c_void};
    use std::rc::Rc;

    const SOURCE: &str = r#"
        public class BuiltinTypes {
            public int PassInt(int value);
            public byte ReturnsByte(int value);
            public float PassFloat(float value);
            public char PassChar(char value);
            public ulong PassULong(ulong value);
            public int Length(string text);
            public void PassOutInt(out int value);
            public void PassRefInt(ref int value);
            public void PassOutString(out string value);
            public void PassRefString(ref string value);
            public void Split(ref int first, ref byte second);
            public bool Throws(ref int value);
            public string ReturnsString();
            public string ReturnsNullString();
        }
        namespace Properties {
            public class Query {
                public static int UniversalAnswer { get; }
                public int Answer { get; set; }
                public string Secret { set; }
            }
        }
        namespace Hierarchy {
            public class Base { public string Describe(Base other); }
            public class Derived : Base { }
            public class Other { public override string ToString(); }
        }
        namespace Enums {
            [Flags] public enum Flags { One = 1 << 0, Two = 1 << 1, Four = 1 << 2 }
            public enum Small : sbyte { Low = -1, High = 1 }
            public static class EnumTypes {
                public static Flags Combine(Flags a, Flags b);
                public static Small Negate(Small value);
            }
        }
        namespace Arrays {
            public static class ArrayTypes {
                public static int SumByteArray(byte[] array);
                public static string[] ReturnsStringArray();
                public static Hierarchy.Base[] Objects(int count);
            }
        }
    "#;

    fn bare_runtime() -> Runtime {
        let assembly = Parser::new(SOURCE).unwrap().parse().unwrap();
        let model = Binder::new().bind(&assembly);
        assert!(model.errors.is_empty(), "{:?}", model.errors);
        Runtime::new(model)
    }

    fn runtime() -> Runtime {
        let mut rt = bare_runtime();
        rt.define("BuiltinTypes", "PassInt(int)", |ctx| Ok(ManagedValue::I32(ctx.arg_as::<i32>(0)? + 1)))
            .define("BuiltinTypes", "ReturnsByte(int)", |ctx| Ok(ManagedValue::I32(ctx.arg_as::<i32>(0)?)))
            .define("BuiltinTypes", "PassFloat(float)", |ctx| Ok(ctx.arg(0)?.clone()))
            .define("BuiltinTypes", "PassChar(char)", |ctx| Ok(ctx.arg(0)?.clone()))
            .define("BuiltinTypes", "PassULong(ulong)", |ctx| Ok(ctx.arg(0)?.clone()))
            .define("BuiltinTypes", "Length(string)", |ctx| {
                Ok(ManagedValue::I32(ctx.arg_as::<String>(0)?.len() as i32))
            })
            .define("BuiltinTypes", "PassOutInt(out int)", |ctx| {
                assert_eq!(ctx.arg(0)?, &ManagedValue::I32(0));
                ctx.set_arg(0, 5)?;
                Ok(ManagedValue::Null)
            })
            .define("BuiltinTypes", "PassRefInt(ref int)", |ctx| {
                let value = ctx.arg_as::<i32>(0)?;
                ctx.set_arg(0, value + 10)?;
                Ok(ManagedValue::Null)
            })
            .define("BuiltinTypes", "PassOutString(out string)", |ctx| {
                ctx.set_arg(0, "Hello")?;
                Ok(ManagedValue::Null)
            })
            .define("BuiltinTypes", "PassRefString(ref string)", |ctx| {
                let text = ctx.arg_as::<String>(0)?;
                ctx.set_arg(0, format!("{} World", text))?;
                Ok(ManagedValue::Null)
            })
            .define("BuiltinTypes", "Split(ref int, ref byte)", |ctx| {
                ctx.set_arg(0, 5)?;
                ctx.set_arg(1, 300)?;
                Ok(ManagedValue::Null)
            })
            .define("BuiltinTypes", "Throws(ref int)", |ctx| {
                ctx.set_arg(0, 7)?;
                Err(ManagedFailure::exception("boom"))
            })
            .define("BuiltinTypes", "ReturnsString()", |_| Ok(ManagedValue::from("héllo")))
            .define("BuiltinTypes", "ReturnsNullString()", |_| Ok(ManagedValue::Null))
            .define("Hierarchy.Base", "Describe(Hierarchy.Base)", |ctx| {
                let other = ctx.arg_as::<ObjectRef>(0)?;
                Ok(ManagedValue::from(other.class().dotted()))
            })
            .define("Enums.EnumTypes", "Combine(Enums.Flags, Enums.Flags)", |ctx| {
                let a = ctx.arg_as::<EnumValue>(0)?;
                let b = ctx.arg_as::<EnumValue>(1)?;
                Ok(ManagedValue::Enum(EnumValue::new(a.type_name.clone(), a.as_u64() | b.as_u64())))
            })
            .define("Enums.EnumTypes", "Negate(Enums.Small)", |ctx| {
                let value = ctx.arg_as::<EnumValue>(0)?;
                Ok(ManagedValue::Enum(EnumValue::signed(value.type_name.clone(), -value.as_i64())))
            })
            .define("Arrays.ArrayTypes", "SumByteArray(byte[])", |ctx| {
                let array = ctx.arg_as::<ManagedArray>(0)?;
                let sum = array
                    .to_vec()
                    .iter()
                    .map(|item| match item {
                        ManagedValue::U8(b) => i32::from(*b),
                        _ => 0,
                    })
                    .sum::<i32>();
                Ok(ManagedValue::I32(sum))
            })
            .define("Arrays.ArrayTypes", "ReturnsStringArray()", |_| {
                Ok(ManagedValue::array(vec!["a".into(), ManagedValue::Null, "c".into()]))
            })
            .define("Arrays.ArrayTypes", "Objects(int)", |ctx| {
                let count = ctx.arg_as::<i32>(0)?;
                let base = TypePath::parse("Hierarchy.Base");
                let items = (0..count).map(|_| ManagedValue::Object(ObjectRef::new(&base))).collect();
                Ok(ManagedValue::array(items))
            });
        rt
    }

    fn construct(rt: &mut Runtime, symbol: &str) -> NativeValue {
        let handle = rt.invoke(symbol, &mut []).unwrap();
        assert!(handle.as_handle().is_some(), "{:?}", handle);
        handle
    }

    fn conversion_of(error: CallError) -> (String, ConversionError) {
        match error {
            CallError::Conversion { parameter, source, .. } => (parameter, source),
            other => panic!("expected a conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_primitives_cross_unchanged() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone(), NativeValue::I32(41)];
        assert_eq!(rt.invoke("BuiltinTypes_PassInt", &mut args).unwrap(), NativeValue::I32(42));

        let mut args = vec![object.clone(), NativeValue::F32(1.5)];
        assert_eq!(rt.invoke("BuiltinTypes_PassFloat", &mut args).unwrap(), NativeValue::F32(1.5));

        let mut args = vec![object.clone(), NativeValue::Char(0x263A)];
        assert_eq!(rt.invoke("BuiltinTypes_PassChar", &mut args).unwrap(), NativeValue::Char(0x263A));

        let mut args = vec![object, NativeValue::U64(u64::MAX)];
        assert_eq!(rt.invoke("BuiltinTypes_PassULong", &mut args).unwrap(), NativeValue::U64(u64::MAX));
    }

    #[test]
    fn test_lossy_conversions_are_rejected() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone(), NativeValue::I32(255)];
        assert_eq!(rt.invoke("BuiltinTypes_ReturnsByte", &mut args).unwrap(), NativeValue::U8(255));

        let mut args = vec![object.clone(), NativeValue::I32(300)];
        let (parameter, source) = conversion_of(rt.invoke("BuiltinTypes_ReturnsByte", &mut args).unwrap_err());
        assert_eq!(parameter, "return");
        assert!(matches!(source, ConversionError::OutOfRange { .. }), "{:?}", source);

        let mut args = vec![object.clone(), NativeValue::F64(0.1)];
        let (parameter, source) = conversion_of(rt.invoke("BuiltinTypes_PassFloat", &mut args).unwrap_err());
        assert_eq!(parameter, "value");
        assert!(matches!(source, ConversionError::OutOfRange { .. }), "{:?}", source);

        let mut args = vec![object.clone(), NativeValue::Bool(true)];
        let (_, source) = conversion_of(rt.invoke("BuiltinTypes_PassInt", &mut args).unwrap_err());
        assert!(matches!(source, ConversionError::TypeMismatch { .. }), "{:?}", source);

        let mut args = vec![object, NativeValue::Null];
        let (_, source) = conversion_of(rt.invoke("BuiltinTypes_PassInt", &mut args).unwrap_err());
        assert_eq!(source, ConversionError::NullNotAllowed("int".to_string()));
    }

    #[test]
    fn test_invalid_utf8_string_is_rejected() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone(), NativeValue::str("four")];
        assert_eq!(rt.invoke("BuiltinTypes_Length", &mut args).unwrap(), NativeValue::I32(4));

        let mut args = vec![object, NativeValue::Str(CString::new(vec![0x66, 0xff]).unwrap())];
        let (parameter, source) = conversion_of(rt.invoke("BuiltinTypes_Length", &mut args).unwrap_err());
        assert_eq!(parameter, "text");
        assert!(matches!(source, ConversionError::InvalidString(_)), "{:?}", source);
    }

    #[test]
    fn test_strings_returned() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone()];
        let text = rt.invoke("BuiltinTypes_ReturnsString", &mut args).unwrap();
        assert_eq!(text.as_str(), Some("héllo"));

        let mut args = vec![object];
        assert_eq!(rt.invoke("BuiltinTypes_ReturnsNullString", &mut args).unwrap(), NativeValue::Null);
    }

    #[test]
    fn test_out_and_ref_parameters() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone(), NativeValue::I32(99)];
        assert_eq!(rt.invoke("BuiltinTypes_PassOutInt", &mut args).unwrap(), NativeValue::Void);
        assert_eq!(args[1], NativeValue::I32(5));

        let mut args = vec![object.clone(), NativeValue::I32(0)];
        rt.invoke("BuiltinTypes_PassRefInt", &mut args).unwrap();
        assert_eq!(args[1], NativeValue::I32(10));

        let mut args = vec![object.clone(), NativeValue::text("previous contents")];
        rt.invoke("BuiltinTypes_PassOutString", &mut args).unwrap();
        assert_eq!(args[1].as_str(), Some("Hello"));
        assert!(matches!(args[1], NativeValue::Text(_)));

        let mut args = vec![object, NativeValue::text("Hello")];
        rt.invoke("BuiltinTypes_PassRefString", &mut args).unwrap();
        assert_eq!(args[1].as_str(), Some("Hello World"));
    }

    #[test]
    fn test_failed_call_leaves_out_and_ref_untouched() {
        let mut rt = runtime();
        let object = construct(&mut rt, "BuiltinTypes_new");

        let mut args = vec![object.clone(), NativeValue::I32(1)];
        let error = rt.invoke("BuiltinTypes_Throws", &mut args).unwrap_err();
        assert_eq!(
            error,
            CallError::Managed {
                symbol: "BuiltinTypes_Throws".to_string(),
                source: ManagedFailure::Exception("boom".to_string()),
            }
        );
        assert_eq!(args[1], NativeValue::I32(1));

        // The first parameter converts fine; the second does not fit a byte.
        let mut args = vec![object, NativeValue::I32(1), NativeValue::U8(2)];
        let (parameter, _) = conversion_of(rt.invoke("BuiltinTypes_Split", &mut args).unwrap_err());
        assert_eq!(parameter, "second");
        assert_eq!(args[1], NativeValue::I32(1));
        assert_eq!(args[2], NativeValue::U8(2));
    }

    #[test]
    fn test_properties() {
        let mut rt = runtime();
        rt.set_static("Properties.Query", "UniversalAnswer", 42);
        assert_eq!(
            rt.invoke("Properties_Query_get_UniversalAnswer", &mut []).unwrap(),
            NativeValue::I32(42)
        );

        let query = construct(&mut rt, "Properties_Query_new");
        let mut args = vec![query.clone()];
        assert_eq!(rt.invoke("Properties_Query_get_Answer", &mut args).unwrap(), NativeValue::I32(0));

        let mut args = vec![query.clone(), NativeValue::I32(42)];
        assert_eq!(rt.invoke("Properties_Query_set_Answer", &mut args).unwrap(), NativeValue::Void);
        let mut args = vec![query.clone()];
        assert_eq!(rt.invoke("Properties_Query_get_Answer", &mut args).unwrap(), NativeValue::I32(42));

        let mut args = vec![query.clone(), NativeValue::str("hunter2")];
        rt.invoke("Properties_Query_set_Secret", &mut args).unwrap();
        let handle = query.as_handle().unwrap();
        assert_eq!(
            rt.resolve(handle).unwrap().field("Secret"),
            Some(ManagedValue::from("hunter2"))
        );
        assert!(rt.model().function("Properties_Query_get_Secret").is_none());
    }

    #[test]
    fn test_handles_are_checked() {
        let mut rt = runtime();
        let base = construct(&mut rt, "Hierarchy_Base_new");
        let derived = construct(&mut rt, "Hierarchy_Derived_new");
        let other = construct(&mut rt, "Hierarchy_Other_new");
        assert_eq!(rt.live_handles(), 3);

        let mut args = vec![base.clone(), derived.clone()];
        let text = rt.invoke("Hierarchy_Base_Describe", &mut args).unwrap();
        assert_eq!(text.as_str(), Some("Hierarchy.Derived"));

        // A derived object is accepted wherever its base is expected.
        let mut args = vec![derived.clone(), base.clone()];
        let text = rt.invoke("Hierarchy_Base_Describe", &mut args).unwrap();
        assert_eq!(text.as_str(), Some("Hierarchy.Base"));

        let mut args = vec![base.clone(), other.clone()];
        let (parameter, source) = conversion_of(rt.invoke("Hierarchy_Base_Describe", &mut args).unwrap_err());
        assert_eq!(parameter, "other");
        assert_eq!(
            source,
            ConversionError::IncompatibleHandle {
                expected: "Hierarchy.Base".to_string(),
                found: "Hierarchy.Other".to_string(),
            }
        );

        let mut args = vec![base.clone(), NativeValue::Handle(Handle::from_raw(999).unwrap())];
        let (_, source) = conversion_of(rt.invoke("Hierarchy_Base_Describe", &mut args).unwrap_err());
        assert_eq!(source, ConversionError::InvalidHandle(999));

        let mut args = vec![NativeValue::Null, base];
        let (parameter, source) = conversion_of(rt.invoke("Hierarchy_Base_Describe", &mut args).unwrap_err());
        assert_eq!(parameter, "this");
        assert_eq!(source, ConversionError::NullNotAllowed("Hierarchy.Base".to_string()));

        let mut args = vec![other];
        let text = rt.invoke("Hierarchy_Other_ToString", &mut args).unwrap();
        assert_eq!(text.as_str(), Some("Hierarchy.Other"));
    }

    #[test]
    fn test_enums() {
        let mut rt = runtime();

        let mut args = vec![NativeValue::I32(0b001), NativeValue::I32(0b100)];
        assert_eq!(rt.invoke("Enums_EnumTypes_Combine", &mut args).unwrap(), NativeValue::I32(0b101));

        let mut args = vec![NativeValue::I8(1)];
        assert_eq!(rt.invoke("Enums_EnumTypes_Negate", &mut args).unwrap(), NativeValue::I8(-1));

        let mut args = vec![NativeValue::I32(200)];
        let (_, source) = conversion_of(rt.invoke("Enums_EnumTypes_Negate", &mut args).unwrap_err());
        assert!(matches!(source, ConversionError::OutOfRange { .. }), "{:?}", source);
    }

    #[test]
    fn test_arrays() {
        let mut rt = runtime();

        let mut args = vec![NativeValue::Array(NativeArray::from_slice(&[1u8, 2, 3]))];
        assert_eq!(rt.invoke("Arrays_ArrayTypes_SumByteArray", &mut args).unwrap(), NativeValue::I32(6));

        let mut args = vec![NativeValue::Array(NativeArray::from_slice(&[1i32]))];
        let (_, source) = conversion_of(rt.invoke("Arrays_ArrayTypes_SumByteArray", &mut args).unwrap_err());
        assert_eq!(
            source,
            ConversionError::ElementMismatch {
                expected: ElementKind::U8,
                found: ElementKind::I32,
            }
        );

        let strings = rt.invoke("Arrays_ArrayTypes_ReturnsStringArray", &mut []).unwrap();
        let strings = strings.as_array().unwrap();
        assert_eq!(strings.kind(), ElementKind::String);
        assert_eq!(strings.len(), 3);
        assert_eq!(strings.get(0).unwrap().as_str(), Some("a"));
        assert_eq!(strings.get(1), Some(NativeValue::Null));
        assert_eq!(strings.get(2).unwrap().as_str(), Some("c"));

        let mut args = vec![NativeValue::I32(2)];
        let objects = rt.invoke("Arrays_ArrayTypes_Objects", &mut args).unwrap();
        let objects = objects.as_array().unwrap();
        assert_eq!(objects.kind(), ElementKind::Handle);
        assert_eq!(rt.live_handles(), 2);
        let first = objects.get(0).unwrap().as_handle().unwrap();
        assert_eq!(rt.resolve(first).unwrap().class(), TypePath::parse("Hierarchy.Base"));
    }

    #[test]
    fn test_call_errors() {
        let mut rt = bare_runtime();

        assert_eq!(
            rt.invoke("Nope", &mut []).unwrap_err(),
            CallError::UnknownSymbol("Nope".to_string())
        );
        assert_eq!(
            rt.invoke("BuiltinTypes_PassInt", &mut [NativeValue::I32(1)]).unwrap_err(),
            CallError::Arity {
                symbol: "BuiltinTypes_PassInt".to_string(),
                expected: 2,
                found: 1,
            }
        );

        let object = construct(&mut rt, "BuiltinTypes_new");
        let mut args = vec![object, NativeValue::I32(1)];
        let error = rt.invoke("BuiltinTypes_PassInt", &mut args).unwrap_err();
        assert_eq!(error.status(), M2N_MISSING_IMPLEMENTATION);
        assert_eq!(
            error.to_string(),
            "BuiltinTypes_PassInt: no managed implementation registered for 'PassInt(int)'"
        );

        let missing: Vec<&str> = rt.unimplemented().iter().map(|f| f.symbol.as_str()).collect();
        assert!(missing.contains(&"BuiltinTypes_PassInt"));
        assert!(!missing.contains(&"Hierarchy_Other_ToString"));
        assert!(!missing.contains(&"Properties_Query_get_Answer"));
    }

    #[test]
    fn test_rooted_objects_survive_collection() {
        let mut rt = runtime();
        let query = construct(&mut rt, "Properties_Query_new");
        let mut args = vec![query.clone(), NativeValue::I32(7)];
        rt.invoke("Properties_Query_set_Answer", &mut args).unwrap();

        rt.collect();

        let mut args = vec![query];
        assert_eq!(rt.invoke("Properties_Query_get_Answer", &mut args).unwrap(), NativeValue::I32(7));
    }

    #[test]
    fn test_handle_table_dedups_objects() {
        let mut table = HandleTable::new();
        let path = TypePath::parse("Hierarchy.Base");
        let first = ObjectRef::new(&path);
        let second = ObjectRef::new(&path);

        let a = table.root(&first);
        assert_eq!(table.root(&first), a);
        let b = table.root(&second);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(a), Some(&first));
        assert!(Handle::from_raw(0).is_none());
        assert!(table.resolve(Handle::from_raw(3).unwrap()).is_none());
    }

    #[test]
    fn test_default_values() {
        let rt = bare_runtime();
        let model = rt.model();
        let flags = m2n_hir::ManagedType::Enum(TypePath::parse("Enums.Flags"));
        assert_eq!(default_value(&flags, model), ManagedValue::Enum(EnumValue::new("Enums.Flags", 0)));
        assert_eq!(default_value(&m2n_hir::ManagedType::String, model), ManagedValue::Null);
    }

    #[test]
    fn test_native_string_buffer() {
        let mut text = NativeString::from("abc");
        text.append(b"def");
        assert_eq!(text.len(), 6);
        assert_eq!(text.to_str(), Ok("abcdef"));
        assert!(text.capacity() >= text.len());
        assert_eq!(unsafe { CStr::from_ptr(text.str) }.to_bytes(), b"abcdef");

        let copy = text.clone();
        text.assign(b"");
        assert!(text.is_empty());
        assert_eq!(unsafe { CStr::from_ptr(text.str) }.to_bytes(), b"");
        assert_eq!(copy.to_str(), Ok("abcdef"));
    }

    #[test]
    fn test_native_string_ignores_length_written_by_c() {
        let initial = CString::new("abc").unwrap();
        let buffer = string::m2n_string_new(initial.as_ptr());
        unsafe { (*buffer).len = usize::MAX };
        assert_eq!(unsafe { (*buffer).as_bytes() }, b"abc");
        assert_eq!(unsafe { (*buffer).len() }, 3);

        let tail = CString::new("def").unwrap();
        string::m2n_string_append(buffer, tail.as_ptr());
        assert_eq!(unsafe { (*buffer).to_str() }, Ok("abcdef"));
        assert_eq!(unsafe { (*buffer).len }, 6);

        unsafe { (*buffer).len = 0 };
        assert_eq!(unsafe { (*buffer).clone() }.to_str(), Ok("abcdef"));
        string::m2n_string_free(buffer);

        let mut numbers = NativeArray::from_slice(&[1i32, 2, 3]);
        numbers.len = 100;
        assert_eq!(numbers.len(), 3);
        assert_eq!(numbers.get(3), None);
    }

    #[test]
    fn test_native_array() {
        assert!(NativeArray::new(ElementKind::Void).is_none());
        assert!(NativeArray::new(ElementKind::Array).is_none());

        let mut numbers = NativeArray::new(ElementKind::I32).unwrap();
        let values = [1i32, 2, 3];
        unsafe { numbers.append_raw(values.as_ptr() as *const c_void, values.len()) };
        numbers.push(&NativeValue::I32(4)).unwrap();
        assert_eq!(numbers.as_slice::<i32>(), Some(&[1, 2, 3, 4][..]));
        assert_eq!(numbers.len, 4);
        assert_eq!(numbers.element_kind, M2N_KIND_I32);
        assert_eq!(
            numbers.push(&NativeValue::Bool(true)),
            Err(ConversionError::ElementMismatch {
                expected: ElementKind::I32,
                found: ElementKind::Bool,
            })
        );
        let third = numbers.element_ptr(2).unwrap();
        assert_eq!(unsafe { *(third as *const i32) }, 3);
        assert!(numbers.element_ptr(4).is_none());

        let hello = CString::new("hello").unwrap();
        let raw: [*const c_char; 2] = [hello.as_ptr(), std::ptr::null()];
        let mut strings = NativeArray::new(ElementKind::String).unwrap();
        unsafe { strings.append_raw(raw.as_ptr() as *const c_void, raw.len()) };
        drop(hello);
        let copy = strings.clone();
        drop(strings);
        assert_eq!(copy.get(0).unwrap().as_str(), Some("hello"));
        assert_eq!(copy.get(1), Some(NativeValue::Null));
    }

    #[test]
    fn test_element_kinds_match_abi_constants() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ElementKind::from_code(16), None);
        assert_eq!(ElementKind::I32.code(), M2N_KIND_I32);
        assert_eq!(ElementKind::String.code(), M2N_KIND_STRING);
        assert_eq!(ElementKind::Array.code(), M2N_KIND_ARRAY);
        assert_eq!(ElementKind::Handle.constant(), "M2N_KIND_HANDLE");
    }

    fn call(symbol: &str, args: &mut [M2nValue]) -> (i32, M2nValue) {
        let symbol = CString::new(symbol).unwrap();
        let mut result = M2nValue::void();
        let status = m2n_invoke(symbol.as_ptr(), args.as_mut_ptr(), args.len(), &mut result);
        (status, result)
    }

    #[test]
    fn test_invoke_through_c_abi() {
        install_runtime(runtime());

        let (status, object) = call("BuiltinTypes_new", &mut []);
        assert_eq!(status, M2N_OK);
        assert_eq!(object.kind, M2N_KIND_HANDLE);
        let handle = unsafe { object.payload.handle };

        let mut out: i32 = -1;
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_I32, &mut out as *mut i32 as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_PassOutInt", &mut args).0, M2N_OK);
        assert_eq!(out, 5);

        let initial = CString::new("Hello").unwrap();
        let buffer = string::m2n_string_new(initial.as_ptr());
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_STRING, buffer as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_PassRefString", &mut args).0, M2N_OK);
        assert_eq!(unsafe { (*buffer).to_str() }, Ok("Hello World"));
        string::m2n_string_free(buffer);

        let mut args = [M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle })];
        let (status, text) = call("BuiltinTypes_ReturnsString", &mut args);
        assert_eq!(status, M2N_OK);
        assert_eq!(text.kind, M2N_KIND_STRING);
        assert_eq!(unsafe { CStr::from_ptr(text.payload.str) }.to_str(), Ok("héllo"));

        uninstall_runtime();
    }

    #[test]
    fn test_c_abi_failures() {
        let (status, _) = call("BuiltinTypes_new", &mut []);
        assert_eq!(status, M2N_NO_RUNTIME);

        install_runtime(runtime());
        let (_, object) = call("BuiltinTypes_new", &mut []);
        let handle = unsafe { object.payload.handle };

        let mut value: i32 = 1;
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_I32, &mut value as *mut i32 as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_Throws", &mut args).0, M2N_MANAGED_FAILURE);
        assert_eq!(value, 1);
        let message = unsafe { CStr::from_ptr(m2n_last_error()) }.to_str().unwrap().to_string();
        assert_eq!(message, "BuiltinTypes_Throws: boom");

        assert_eq!(call("Missing_Symbol", &mut []).0, M2N_UNKNOWN_SYMBOL);

        // Out parameters must come as references.
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::new(M2N_KIND_I32, M2nPayload { i32: 0 }),
        ];
        assert_eq!(call("BuiltinTypes_PassOutInt", &mut args).0, M2N_INVALID_ARGUMENT);

        uninstall_runtime();
    }

    #[test]
    fn test_mis_kinded_by_ref_slots_never_reach_managed_code() {
        let calls = Rc::new(Cell::new(0));
        let mut rt = runtime();
        let counter = calls.clone();
        rt.define("BuiltinTypes", "PassRefInt(ref int)", move |ctx| {
            counter.set(counter.get() + 1);
            let value = ctx.arg_as::<i32>(0)?;
            ctx.set_arg(0, value + 10)?;
            Ok(ManagedValue::Null)
        });
        install_runtime(rt);
        let (_, object) = call("BuiltinTypes_new", &mut []);
        let handle = unsafe { object.payload.handle };

        // A `ref int` handed a 64-bit slot.
        let mut wide: i64 = 1;
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_I64, &mut wide as *mut i64 as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_PassRefInt", &mut args).0, M2N_INVALID_ARGUMENT);
        assert_eq!(calls.get(), 0);
        assert_eq!(wide, 1);
        let message = unsafe { CStr::from_ptr(m2n_last_error()) }.to_str().unwrap().to_string();
        assert_eq!(message, "argument 1: parameter 'value' needs a slot of kind M2N_KIND_I32, found 9");

        // The first slot fits, the second does not: nothing is written.
        let mut first: i32 = 1;
        let mut second: i32 = 2;
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_I32, &mut first as *mut i32 as *mut c_void),
            M2nValue::by_ref(M2N_KIND_I32, &mut second as *mut i32 as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_Split", &mut args).0, M2N_INVALID_ARGUMENT);
        assert_eq!((first, second), (1, 2));

        let mut value: i32 = 1;
        let mut args = [
            M2nValue::new(M2N_KIND_HANDLE, M2nPayload { handle }),
            M2nValue::by_ref(M2N_KIND_I32, &mut value as *mut i32 as *mut c_void),
        ];
        assert_eq!(call("BuiltinTypes_PassRefInt", &mut args).0, M2N_OK);
        assert_eq!(calls.get(), 1);
        assert_eq!(value, 11);

        uninstall_runtime();
    }

    #[test]
    fn test_arrays_through_c_abi() {
        install_runtime(runtime());

        let bytes = array::m2n_array_new(M2N_KIND_U8);
        let values = [1u8, 2, 3];
        array::m2n_array_append_vals(bytes, values.as_ptr() as *const c_void, values.len());
        assert_eq!(array::m2n_array_len(bytes), 3);

        let mut args = [M2nValue::new(M2N_KIND_ARRAY, M2nPayload { array: bytes })];
        let (status, sum) = call("Arrays_ArrayTypes_SumByteArray", &mut args);
        assert_eq!(status, M2N_OK);
        assert_eq!(unsafe { sum.payload.i32 }, 6);
        array::m2n_array_free(bytes);

        let (status, strings) = call("Arrays_ArrayTypes_ReturnsStringArray", &mut []);
        assert_eq!(status, M2N_OK);
        assert_eq!(strings.kind, M2N_KIND_ARRAY);
        let strings = unsafe { strings.payload.array };
        assert_eq!(array::m2n_array_len(strings), 3);
        let first = array::m2n_array_index(strings, 0) as *const *const c_char;
        assert_eq!(unsafe { CStr::from_ptr(*first) }.to_str(), Ok("a"));
        assert!(array::m2n_array_index(strings, 3).is_null());
        array::m2n_array_free(strings);

        assert!(array::m2n_array_new(M2N_KIND_VOID).is_null());

        uninstall_runtime();
    }
}
