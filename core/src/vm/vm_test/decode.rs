use std::rc::Rc;

use super::control_flow::factorial_block;
use super::*;
use crate::vm::encode_value;

#[test]
fn test_encoded_program_decodes_to_equivalent_closure() -> Result<()> {
    let rt = runtime();
    let original = factorial_block().recursive()?;
    let Value::Closure(closure) = decode_program(&rt, &original)? else {
        bail!("expected a closure");
    };
    let encoded = encode_closure(&closure)?;
    assert_eq!(encoded, original);

    let reloaded = decode_program(&rt, &encoded)?;
    let result = rt.run(reloaded, vec![Value::from(10)])?;
    assert!(matches!(result, Value::Integer(3_628_800)));
    Ok(())
}

#[test]
fn test_tagged_nodes_preserve_sharing_and_cycles() -> Result<()> {
    let rt = runtime();
    let program = json!(["t", [0, "list", 1, [0]], [0]]);
    let value = decode_program(&rt, &program)?;
    let Value::Tuple(items) = &value else {
        bail!("expected a tuple, got {value:?}");
    };
    let (Value::List(first), Value::List(second)) = (&items[0], &items[1]) else {
        bail!("expected two lists");
    };
    assert!(Rc::ptr_eq(first, second));
    assert!(matches!(&first.borrow()[1], Value::List(inner) if Rc::ptr_eq(inner, first)));

    let encoded = encode_value(&value)?;
    assert_eq!(encoded, program);
    Ok(())
}

#[test]
fn test_scalar_and_composite_encodings() -> Result<()> {
    let rt = runtime();
    let decode = |json: Json| decode_program(&rt, &json);

    assert!(decode(json!(null))?.is_nil());
    assert!(matches!(decode(json!(7))?, Value::Integer(7)));
    assert!(matches!(decode(json!(7.5))?, Value::Real(r) if r == 7.5));
    assert!(matches!(decode(json!(["some"]))?, Value::Some));
    assert!(matches!(decode(json!(["_"]))?, Value::Blank));
    assert_eq!(decode(json!(["m", "a", 1, "b", ["l", 2]]))?.to_string(), "{a is 1, b is [2]}");
    assert_eq!(decode(json!(["n", "x", "y"]))?.to_string(), "names(x, y)");
    assert!(matches!(decode(json!([":", "+"]))?, Value::Method(m) if m.name() == "+"));
    assert!(matches!(decode(json!(["var", 3]))?.deref_value(), Value::Integer(3)));

    let Value::Regex(regex) = decode(json!(["r", "(?i)^abc$"]))? else {
        bail!("expected regex");
    };
    assert!(regex.is_match("ABC"));
    Ok(())
}

#[test]
fn test_typed_array_loads_shape_and_strides() -> Result<()> {
    let rt = runtime();
    let value = decode_program(&rt, &json!(["array", "int32", [2, 3], [1, 2, 3, 4, 5, 6]]))?;
    let Value::Array(array) = &value else {
        bail!("expected array, got {value:?}");
    };
    assert_eq!(array.shape(), &[2, 3]);
    assert_eq!(array.strides(), &[12, 4]);
    assert!(matches!(array.get(4), Some(Value::Integer(5))));
    assert_eq!(rt.type_of(&value).name(), "array::int32");

    let unknown = decode_program(&rt, &json!(["array", "int128", [1], [1]]));
    assert!(format!("{:#}", unknown.expect_err("unknown kind")).contains("ArrayError"));
    let short = decode_program(&rt, &json!(["array", "float64", [2, 2], [1.0, 2.0]]));
    assert!(format!("{:#}", short.expect_err("count mismatch")).contains("needs 4 values"));
    Ok(())
}

#[test]
fn test_globals_resolve_through_modules() -> Result<()> {
    let rt = runtime();
    let module = crate::val::Module::new("text");
    module.set_export("sep", Value::from(", "));
    rt.globals().define("text", Value::Module(module));

    assert_eq!(decode_program(&rt, &global("text::sep"))?.to_string(), ", ");
    assert!(matches!(decode_program(&rt, &global("integer"))?, Value::Type(_)));
    let missing = decode_program(&rt, &global("text::nothing"));
    assert!(missing.expect_err("unresolved").to_string().contains("unknown global"));
    Ok(())
}

#[test]
fn test_load_failures_are_host_errors() -> Result<()> {
    let rt = runtime();
    let block = Block::new("v.kt", vec![json!([3, 1]), json!([0, 1])]);

    let wrong_version = json!(["z", block.info_with_version(BYTECODE_VERSION + 1)?]);
    let err = decode_program(&rt, &wrong_version).expect_err("version skew");
    assert!(format!("{err:#}").contains("bytecode version mismatch"));

    let err = decode_program(&rt, &json!(["o", "nope"])).expect_err("unknown object");
    assert!(err.to_string().contains("unknown object constructor"));

    let err = decode_program(&rt, &json!(["?"])).expect_err("bad tag");
    assert!(err.to_string().contains("unknown value tag"));

    let err = decode_program(&rt, &json!([9])).expect_err("dangling reference");
    assert!(err.to_string().contains("undefined tag 9"));

    let mut info = block.info()?;
    info[12] = json!([15, 1, 1, 0, 1]);
    let err = decode_program(&rt, &json!(["z", info])).expect_err("misaligned jump");
    assert!(format!("{err:#}").contains("not an instruction boundary"));

    let mut info = block.info()?;
    info[12] = json!([99, 1]);
    let err = decode_program(&rt, &json!(["z", info])).expect_err("bad opcode");
    assert!(format!("{err:#}").contains("unknown opcode 99"));
    Ok(())
}

#[test]
fn test_switch_objects_from_default_registry() -> Result<()> {
    let rt = runtime();
    let types = decode_program(
        &rt,
        &json!(["o", "type-switch", ["l", global("integer")], ["l", global("string"), global("list")]]),
    )?;
    let call = |func: &Value, arg: Value| rt.run(func.clone(), vec![arg]).map(|v| v.to_string());
    assert_eq!(call(&types, Value::from(1))?, "0");
    assert_eq!(call(&types, Value::list(Vec::new()))?, "1");
    assert_eq!(call(&types, Value::from(1.5))?, "2");

    let strings = decode_program(&rt, &json!(["o", "string-switch", ["l", "a", "b"], ["l", ["r", "^z"]]]))?;
    assert_eq!(call(&strings, Value::from("b"))?, "0");
    assert_eq!(call(&strings, Value::from("zed"))?, "1");
    assert_eq!(call(&strings, Value::from("q"))?, "2");

    let numbers = decode_program(&rt, &json!(["o", "number-switch", ["l", 1, 2], ["l", ["l", 5, 9]]]))?;
    assert_eq!(call(&numbers, Value::from(2))?, "0");
    assert_eq!(call(&numbers, Value::from(7))?, "1");
    assert_eq!(call(&numbers, Value::from(4))?, "2");

    let template = decode_program(&rt, &json!(["o", "map-template", "x", "y"]))?;
    let map = rt.run(template, vec![Value::from(1), Value::from(2)])?;
    assert_eq!(map.to_string(), "{x is 1, y is 2}");
    Ok(())
}

#[test]
fn test_host_registered_object_constructor() -> Result<()> {
    let rt = runtime();
    rt.objects().register("pair", |_, args| Ok(Value::tuple(args)));
    let value = decode_program(&rt, &json!(["o", "pair", 1, "b"]))?;
    assert!(matches!(&value, Value::Tuple(items) if items.len() == 2));
    Ok(())
}
