//! Shared fixture: a bootstrap `Object` class and helpers for building
//! classes on top of it.

#![allow(dead_code)]

use unrealscript::{BuildReport, OpCode, ScriptPackage};

/// `Object` with the core structs, the native operators the tests use and
/// one iterator and one latent function.
pub const OBJECT: &str = r#"
class Object native;

struct Vector
{
    var float X, Y, Z;
};

struct Rotator
{
    var int Pitch, Yaw, Roll;
};

native(129) static final preoperator bool ! (bool A);
native(143) static final preoperator int - (int A);
native(163) static final preoperator int ++ (out int A);
native(144) static final operator(16) int * (int A, int B);
native(146) static final operator(20) int + (int A, int B);
native(147) static final operator(20) int - (int A, int B);
native(150) static final operator(24) bool < (int A, int B);
native(151) static final operator(24) bool > (int A, int B);
native(154) static final operator(24) bool == (int A, int B);
native(155) static final operator(26) bool != (int A, int B);
native(161) static final operator(34) int += (out int A, int B);
native(174) static final operator(20) float + (float A, float B);

native(197) final iterator function AllObjects(class<Object> BaseClass, out Object Obj);
native(256) final latent function Sleep(float Seconds);
"#;

/// A package holding [`OBJECT`] and then each of `sources` in order.
pub fn package(sources: &[&str]) -> ScriptPackage {
    let mut package = ScriptPackage::new();
    package.add_source(OBJECT).expect("Object source");
    for source in sources {
        package.add_source(source).expect("class header");
    }
    package
}

/// Build [`package`] of `sources`.
pub fn build(sources: &[&str]) -> (ScriptPackage, BuildReport) {
    let mut package = package(sources);
    let report = package.build().expect("build");
    (package, report)
}

/// Build and require success.
pub fn build_ok(sources: &[&str]) -> ScriptPackage {
    let (package, report) = build(sources);
    assert!(report.is_success(), "{:#?}", report.diagnostics);
    package
}

/// Messages of every error reported while building `sources`.
pub fn errors(sources: &[&str]) -> Vec<String> {
    let (_, report) = build(sources);
    report.diagnostics.errors().map(|d| d.message.clone()).collect()
}

pub fn op(code: OpCode) -> u8 {
    code.into()
}

pub fn read_u16(code: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([code[at], code[at + 1]])
}

pub fn read_u32(code: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]])
}
