//! Builds the root object and its prototype skeleton: the eight NOINHERIT
//! base objects (`int`, `float`, `bool`, `string`, `array`, `closure`,
//! `function`, `pointer`) with their operator/method properties wired up
//! as native closures, plus `print`, `keys`, `ffi`, and `malloc`. Mirrors
//! `create_root` in `original_source/src/vm/runtime.c`.
//!
//! The `xml` module `create_root` also installs has no counterpart here:
//! nothing in this runtime's surface names it. Its `library_map`
//! dlopen-renaming table and the two `float`/`double`-specialized FFI call
//! fast paths in `ffi.c` are likewise left out as host-OS/perf-only
//! features with no externally visible behavior.

use std::rc::Rc;

use fgc::{GcState, ObjHandle, ObjectFlags, ObjectPayload, Value};

use crate::boxed::{box_array, box_bool, box_float, box_int, box_string, set_length};
use crate::coerce::{as_bool, as_float, as_int, as_string};
use crate::ffi;
use crate::value_cache::ValueCache;

fn set(gc: &mut GcState, obj: ObjHandle, name: &str, value: Value) {
    fgc::set(&mut gc.heap, obj, faxc_util::prepare_key_str(name), value)
        .expect("root construction: target object is neither closed nor frozen yet");
}

/// Installs a native method: the function object must chain to
/// `function_base` or `setup_call`'s `instance_of_or_equal` check rejects
/// it as not callable.
fn native(
    gc: &mut GcState,
    vcache: &ValueCache,
    obj: ObjHandle,
    name: &str,
    f: impl Fn(&mut GcState, Value, &[Value]) -> Result<Value, String> + 'static,
) {
    let fn_obj = gc.alloc_raw(Some(vcache.function_base), ObjectPayload::Function(Rc::new(f)));
    gc.heap.get(fn_obj).set_flag(ObjectFlags::NOINHERIT);
    set(gc, obj, name, Value::Object(fn_obj));
}

fn base(gc: &mut GcState) -> ObjHandle {
    let h = gc.alloc_raw(None, ObjectPayload::Plain);
    gc.heap.get(h).set_flag(ObjectFlags::NOINHERIT);
    h
}

/// Builds the root object, its prototype chain, and the `ValueCache` of
/// base handles the VM bridges primitives onto. Returns `(root, vcache)`;
/// the caller (`faxc-drv`, `faxi`) owns the `GcState` directly.
pub fn build_root(gc: &mut GcState) -> (ObjHandle, ValueCache) {
    let root = gc.alloc_raw(None, ObjectPayload::Plain);

    let function_base = base(gc);
    let int_base = base(gc);
    let float_base = base(gc);
    let bool_base = base(gc);
    let string_base = base(gc);
    let array_base = base(gc);
    let closure_base = base(gc);
    let pointer_base = base(gc);

    let vcache = ValueCache {
        int_base,
        float_base,
        bool_base,
        string_base,
        array_base,
        closure_base,
        function_base,
        pointer_base,
    };

    set(gc, root, "function", Value::Object(function_base));
    set(gc, root, "int", Value::Object(int_base));
    set(gc, root, "float", Value::Object(float_base));
    set(gc, root, "bool", Value::Object(bool_base));
    set(gc, root, "string", Value::Object(string_base));
    set(gc, root, "array", Value::Object(array_base));
    set(gc, root, "closure", Value::Object(closure_base));
    set(gc, root, "pointer", Value::Object(pointer_base));
    set(gc, root, "null", Value::Null);

    install_int(gc, &vcache, int_base);
    install_float(gc, &vcache, float_base);
    install_bool(gc, &vcache, root, bool_base);
    install_string(gc, &vcache, string_base);
    install_array(gc, &vcache, array_base);
    install_pointer(gc, &vcache, pointer_base);

    install_print(gc, &vcache, root);
    native(gc, &vcache, root, "keys", move |gc, _this, args| keys_fn(gc, &vcache, args));
    native(gc, &vcache, root, "malloc", move |gc, _this, args| ffi::malloc_fn(gc, &vcache, args));

    ffi::install(gc, &vcache, root);

    (root, vcache)
}

fn one_num_arg(args: &[Value]) -> Result<Value, String> {
    args.first().copied().ok_or_else(|| "expected an argument".to_string())
}

/// `int_add`/`int_sub`/`int_mul`/`int_div` all promote to float when the
/// right-hand operand is a float, matching `int_math_fn` in
/// `original_source/src/vm/runtime.c`.
fn install_int(gc: &mut GcState, vcache: &ValueCache, int_base: ObjHandle) {
    macro_rules! int_op {
        ($name:expr, $iop:expr, $fop:expr) => {{
            let vcache = *vcache;
            native(gc, &vcache, int_base, $name, move |gc, this, args| {
                let lhs = as_int(gc, &vcache, this).ok_or("expected an int receiver")?;
                let rhs = one_num_arg(args)?;
                if let Some(r) = as_int(gc, &vcache, rhs) {
                    Ok(box_int(gc, &vcache, $iop(lhs, r)))
                } else if let Some(r) = as_float(gc, &vcache, rhs) {
                    Ok(box_float(gc, &vcache, $fop(lhs as f32, r)))
                } else {
                    Err("int arithmetic requires an int or float operand".to_string())
                }
            });
        }};
    }
    int_op!("+", |a: i32, b: i32| a.wrapping_add(b), |a: f32, b: f32| a + b);
    int_op!("-", |a: i32, b: i32| a.wrapping_sub(b), |a: f32, b: f32| a - b);
    int_op!("*", |a: i32, b: i32| a.wrapping_mul(b), |a: f32, b: f32| a * b);
    int_op!("/", |a: i32, b: i32| if b == 0 { 0 } else { a / b }, |a: f32, b: f32| a / b);

    macro_rules! int_cmp {
        ($name:expr, $iop:expr, $fop:expr) => {{
            let vcache = *vcache;
            native(gc, &vcache, int_base, $name, move |gc, this, args| {
                let lhs = as_int(gc, &vcache, this).ok_or("expected an int receiver")?;
                let rhs = one_num_arg(args)?;
                if let Some(r) = as_int(gc, &vcache, rhs) {
                    Ok(box_bool(gc, &vcache, $iop(lhs, r)))
                } else if let Some(r) = as_float(gc, &vcache, rhs) {
                    Ok(box_bool(gc, &vcache, $fop(lhs as f32, r)))
                } else {
                    Ok(box_bool(gc, &vcache, false))
                }
            });
        }};
    }
    int_cmp!("==", |a: i32, b: i32| a == b, |a: f32, b: f32| a == b);
    int_cmp!("<", |a: i32, b: i32| a < b, |a: f32, b: f32| a < b);
    int_cmp!(">", |a: i32, b: i32| a > b, |a: f32, b: f32| a > b);
    int_cmp!("<=", |a: i32, b: i32| a <= b, |a: f32, b: f32| a <= b);
    int_cmp!(">=", |a: i32, b: i32| a >= b, |a: f32, b: f32| a >= b);

    let vcache = *vcache;
    native(gc, &vcache, int_base, "parse", move |gc, _this, args| {
        let s = args.first().copied().and_then(|v| as_string(gc, &vcache, v)).ok_or("parse expects a string")?;
        let s = s.trim();
        let n = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            i32::from_str_radix(hex, 16)
        } else {
            s.parse::<i32>()
        }
        .map_err(|e| e.to_string())?;
        Ok(box_int(gc, &vcache, n))
    });
}

fn install_float(gc: &mut GcState, vcache: &ValueCache, float_base: ObjHandle) {
    macro_rules! float_op {
        ($name:expr, $op:expr) => {{
            let vcache = *vcache;
            native(gc, &vcache, float_base, $name, move |gc, this, args| {
                let lhs = as_float(gc, &vcache, this).ok_or("expected a float receiver")?;
                let rhs = one_num_arg(args)?;
                let r = as_float(gc, &vcache, rhs)
                    .or_else(|| as_int(gc, &vcache, rhs).map(|i| i as f32))
                    .ok_or("float arithmetic requires an int or float operand")?;
                Ok(box_float(gc, &vcache, $op(lhs, r)))
            });
        }};
    }
    float_op!("+", |a: f32, b: f32| a + b);
    float_op!("-", |a: f32, b: f32| a - b);
    float_op!("*", |a: f32, b: f32| a * b);
    float_op!("/", |a: f32, b: f32| a / b);

    macro_rules! float_cmp {
        ($name:expr, $op:expr) => {{
            let vcache = *vcache;
            native(gc, &vcache, float_base, $name, move |gc, this, args| {
                let lhs = as_float(gc, &vcache, this).ok_or("expected a float receiver")?;
                let rhs = one_num_arg(args)?;
                let r = as_float(gc, &vcache, rhs).or_else(|| as_int(gc, &vcache, rhs).map(|i| i as f32));
                Ok(box_bool(gc, &vcache, r.map(|r| $op(lhs, r)).unwrap_or(false)))
            });
        }};
    }
    float_cmp!("==", |a: f32, b: f32| a == b);
    float_cmp!("<", |a: f32, b: f32| a < b);
    float_cmp!(">", |a: f32, b: f32| a > b);
    float_cmp!("<=", |a: f32, b: f32| a <= b);
    float_cmp!(">=", |a: f32, b: f32| a >= b);
}

fn install_bool(gc: &mut GcState, vcache: &ValueCache, root: ObjHandle, bool_base: ObjHandle) {
    let vc = *vcache;
    native(gc, &vc, bool_base, "!", move |gc, this, _args| {
        let b = as_bool(gc, &vc, this).ok_or("expected a bool receiver")?;
        Ok(box_bool(gc, &vc, !b))
    });
    let true_v = box_bool(gc, vcache, true);
    let false_v = box_bool(gc, vcache, false);
    set(gc, root, "true", true_v);
    set(gc, root, "false", false_v);
}

/// `+` coerces the right-hand operand the way `string_add_fn` does:
/// string as-is, float/int formatted, bool as `true`/`false`. `==` is
/// strict: only string-vs-string compares equal (`string_eq_fn`).
fn install_string(gc: &mut GcState, vcache: &ValueCache, string_base: ObjHandle) {
    let vc = *vcache;
    native(gc, &vc, string_base, "+", move |gc, this, args| {
        let lhs = as_string(gc, &vc, this).ok_or("expected a string receiver")?;
        let rhs = one_num_arg(args)?;
        let tail = if let Some(s) = as_string(gc, &vc, rhs) {
            s
        } else if let Some(f) = as_float(gc, &vc, rhs) {
            format!("{f}")
        } else if let Some(i) = as_int(gc, &vc, rhs) {
            format!("{i}")
        } else if let Some(b) = as_bool(gc, &vc, rhs) {
            if b { "true".to_string() } else { "false".to_string() }
        } else {
            return Err("string concatenation requires a primitive operand".to_string());
        };
        Ok(box_string(gc, &vc, lhs + &tail))
    });
    let vc = *vcache;
    native(gc, &vc, string_base, "==", move |gc, this, args| {
        let lhs = as_string(gc, &vc, this).ok_or("expected a string receiver")?;
        let rhs = one_num_arg(args)?;
        let eq = as_string(gc, &vc, rhs).map(|r| r == lhs).unwrap_or(false);
        Ok(box_bool(gc, &vc, eq))
    });
}

/// `resize`/`push`/`pop`/`[]`/`[]=` all keep the array's `"length"`
/// property synced the way `array_resize_fn`/`array_push_fn`/
/// `array_pop_fn` do in the original.
fn install_array(gc: &mut GcState, vcache: &ValueCache, array_base: ObjHandle) {
    let vc = *vcache;
    native(gc, &vc, array_base, "resize", move |gc, this, args| {
        let h = this.as_object().ok_or("expected an array receiver")?;
        let new_len = args.first().copied().and_then(|v| as_int(gc, &vc, v)).ok_or("resize expects an int")?;
        let new_len = new_len.max(0) as usize;
        match &mut gc.heap.get_mut(h).payload {
            ObjectPayload::Array(elems) => elems.resize(new_len, Value::Null),
            _ => return Err("expected an array receiver".to_string()),
        }
        set_length(gc, &vc, h, new_len as i32);
        Ok(this)
    });

    let vc = *vcache;
    native(gc, &vc, array_base, "push", move |gc, this, args| {
        let h = this.as_object().ok_or("expected an array receiver")?;
        let v = one_num_arg(args)?;
        let len = match &mut gc.heap.get_mut(h).payload {
            ObjectPayload::Array(elems) => {
                elems.push(v);
                elems.len()
            }
            _ => return Err("expected an array receiver".to_string()),
        };
        set_length(gc, &vc, h, len as i32);
        Ok(this)
    });

    let vc = *vcache;
    native(gc, &vc, array_base, "pop", move |gc, this, _args| {
        let h = this.as_object().ok_or("expected an array receiver")?;
        let (popped, len) = match &mut gc.heap.get_mut(h).payload {
            ObjectPayload::Array(elems) => (elems.pop().unwrap_or(Value::Null), elems.len()),
            _ => return Err("expected an array receiver".to_string()),
        };
        set_length(gc, &vc, h, len as i32);
        Ok(popped)
    });

    let vc = *vcache;
    native(gc, &vc, array_base, "[]", move |gc, this, args| {
        let h = this.as_object().ok_or("expected an array receiver")?;
        let idx = args.first().copied().and_then(|v| as_int(gc, &vc, v)).ok_or("index expects an int")?;
        match &gc.heap.get(h).payload {
            ObjectPayload::Array(elems) => {
                let idx = usize::try_from(idx).map_err(|_| "array index out of bounds".to_string())?;
                elems.get(idx).copied().ok_or_else(|| "array index out of bounds".to_string())
            }
            _ => Err("expected an array receiver".to_string()),
        }
    });

    let vc = *vcache;
    native(gc, &vc, array_base, "[]=", move |gc, this, args| {
        let h = this.as_object().ok_or("expected an array receiver")?;
        let idx = args.first().copied().and_then(|v| as_int(gc, &vc, v)).ok_or("index expects an int")?;
        let value = *args.get(1).ok_or("[]= expects a value argument")?;
        let idx = usize::try_from(idx).map_err(|_| "array index out of bounds".to_string())?;
        match &mut gc.heap.get_mut(h).payload {
            ObjectPayload::Array(elems) => {
                if idx >= elems.len() {
                    return Err("array index out of bounds".to_string());
                }
                elems[idx] = value;
            }
            _ => return Err("expected an array receiver".to_string()),
        }
        Ok(value)
    });
}

fn install_pointer(gc: &mut GcState, vcache: &ValueCache, pointer_base: ObjHandle) {
    let vc = *vcache;
    native(gc, &vc, pointer_base, "null", move |gc, _this, _args| Ok(crate::boxed::box_pointer(gc, &vc, 0)));
}

/// Recursive printer: primitives via their natural formatting, arrays as
/// `[ a, b, c ]`, objects via a `toString` property when present (invoked
/// through a sub-VM the same way overload fallback dispatch does),
/// otherwise a generic `[object | 'key': value, ...]` table dump. Mirrors
/// `print_fn_recursive` in `original_source/src/vm/runtime.c`, minus the
/// raw heap address (nothing in this tree exposes one usefully).
fn install_print(gc: &mut GcState, vcache: &ValueCache, root: ObjHandle) {
    let vc = *vcache;
    native(gc, &vc, root, "print", move |gc, _this, args| {
        let mut out = String::new();
        for (i, v) in args.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            format_value(gc, &vc, *v, &mut out);
        }
        println!("{out}");
        Ok(Value::Null)
    });
}

fn format_value(gc: &GcState, vcache: &ValueCache, v: Value, out: &mut String) {
    use std::fmt::Write;
    match v {
        Value::Null => out.push_str("null"),
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
        Value::Object(h) => {
            if let Some(n) = as_int(gc, vcache, v) {
                let _ = write!(out, "{n}");
            } else if let Some(f) = as_float(gc, vcache, v) {
                let _ = write!(out, "{f}");
            } else if let Some(b) = as_bool(gc, vcache, v) {
                out.push_str(if b { "true" } else { "false" });
            } else if let Some(s) = as_string(gc, vcache, v) {
                out.push_str(&s);
            } else if fgc::instance_of_or_equal(&gc.heap, h, vcache.array_base) {
                out.push_str("[ ");
                if let ObjectPayload::Array(elems) = &gc.heap.get(h).payload {
                    for (i, e) in elems.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        format_value(gc, vcache, *e, out);
                    }
                }
                out.push_str(" ]");
            } else {
                // `toString` overloads would require a sub-VM call, which
                // needs the compiled-module context this builtin doesn't
                // have; fall back straight to the generic table dump.
                out.push_str("[object");
                let mut first = true;
                for (key, value) in gc.heap.get(h).table.iter() {
                    out.push_str(if first { " | " } else { ", " });
                    first = false;
                    let _ = write!(out, "'{}': ", key.as_str());
                    format_value(gc, vcache, value, out);
                }
                out.push(']');
            }
        }
    }
}

fn keys_fn(gc: &mut GcState, vcache: &ValueCache, args: &[Value]) -> Result<Value, String> {
    let h = args.first().copied().and_then(|v| v.as_object()).ok_or("keys expects an object")?;
    let names: Vec<String> = gc.heap.get(h).table.iter().map(|(k, _)| k.as_str().to_string()).collect();
    let elems: Vec<Value> = names.into_iter().map(|n| box_string(gc, vcache, n)).collect();
    Ok(box_array(gc, vcache, elems))
}

