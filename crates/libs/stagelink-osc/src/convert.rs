//! Mapping between the bridge's scalar argument model and OSC wire types.

use rosc::OscType;
use stagelink_hub::Arg;

/// Arguments go out in the plain OSC scalar encodings: `i`/`h` for
/// integers depending on range, `f` for floats (the original device fleet
/// reads float32), `s`, `T`/`F`, `N`.
pub(crate) fn arg_to_osc(arg: &Arg) -> OscType {
    match arg {
        Arg::Int(n) => match i32::try_from(*n) {
            Ok(small) => OscType::Int(small),
            Err(_) => OscType::Long(*n),
        },
        Arg::Float(f) => OscType::Float(*f as f32),
        Arg::Str(s) => OscType::String(s.clone()),
        Arg::Bool(b) => OscType::Bool(*b),
        Arg::Nil => OscType::Nil,
    }
}

/// Inbound OSC arguments outside the scalar model (blobs, timetags, midi,
/// nested arrays) have no cloud-side shape; callers skip the `None`s with
/// a warning.
pub(crate) fn osc_to_arg(osc: &OscType) -> Option<Arg> {
    match osc {
        OscType::Int(n) => Some(Arg::Int(i64::from(*n))),
        OscType::Long(n) => Some(Arg::Int(*n)),
        OscType::Float(f) => Some(Arg::Float(f64::from(*f))),
        OscType::Double(d) => Some(Arg::Float(*d)),
        OscType::String(s) => Some(Arg::Str(s.clone())),
        OscType::Bool(b) => Some(Arg::Bool(*b)),
        OscType::Nil => Some(Arg::Nil),
        _ => None,
    }
}
