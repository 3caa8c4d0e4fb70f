//! Wire encoding of instructions.

use super::value::Value;

/// Encodes `opcode` and `params` into the framed wire form
/// `len(e0).e0,len(e1).e1,...;`, where `len` counts Unicode code points.
pub fn encode(opcode: &str, params: &[Value]) -> String {
    let mut elements: Vec<String> = Vec::with_capacity(params.len() + 1);
    elements.push(opcode.to_owned());
    elements.extend(params.iter().map(Value::render));

    let mut out = String::new();
    for element in &elements {
        let len = element.chars().count();
        out.push_str(&len.to_string());
        out.push('.');
        out.push_str(element);
        out.push(',');
    }
    // Replace the trailing comma with the instruction terminator.
    out.pop();
    out.push(';');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_mouse_event() {
        let params = vec![Value::from(100i32), Value::from(200i32), Value::from(5i32)];
        assert_eq!(encode("mouse", &params), "5.mouse,3.100,3.200,1.5;");
    }

    #[test]
    fn encodes_zero_params() {
        assert_eq!(encode("nop", &[]), "3.nop;");
    }

    #[test]
    fn encodes_code_point_lengths_not_byte_lengths() {
        let params = vec![Value::from("héllo")];
        // "héllo" is 5 code points, 6 UTF-8 bytes.
        assert_eq!(encode("name", &params), "4.name,5.héllo;");
    }

    #[test]
    fn round_trips_through_decoder() {
        use super::super::decoder::{Decoder, RawInstruction};

        let params = vec![Value::from(1i32), Value::from("image/png"), Value::from(true)];
        let wire = encode("img", &params);

        let mut d = Decoder::new();
        let got = d.receive(&wire).unwrap();
        assert_eq!(
            got,
            vec![RawInstruction {
                opcode: "img".to_string(),
                params: vec!["1".to_string(), "image/png".to_string(), "1".to_string()],
            }]
        );
    }
}
