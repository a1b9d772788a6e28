#![cfg(feature = "std")]

/// Prints the instructions of one code section, one per line, with decoded
/// immediates. Diagnostics helper; the output format is not stable.
pub fn print(code: &[u8]) {
    use crate::{opcode::*, utils::read_i16};

    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        let opcode = &OPCODE_INFO[op as usize];

        let Some(opcode) = opcode else {
            println!("Unknown opcode: 0x{op:02X}");
            i += 1;
            continue;
        };

        if opcode.immediate_size() != 0 {
            // Check if the opcode immediates are within the bounds of the code
            if i + opcode.immediate_size() as usize >= code.len() {
                println!("Malformed code: immediate out of bounds");
                break;
            }
        }

        print!("{}", opcode.name());
        if opcode.immediate_size() != 0 {
            let immediate = &code[i + 1..i + 1 + opcode.immediate_size() as usize];
            print!(" : 0x");
            for byte in immediate {
                print!("{byte:02x}");
            }
            if opcode.immediate_size() == 2 {
                print!(" ({})", i16::from_be_bytes([immediate[0], immediate[1]]));
            }
        }
        println!();

        let mut rjumpv_additional_immediates = 0;
        if op == RJUMPV {
            let count = code[i + 1] as usize;
            rjumpv_additional_immediates = count * 2;

            // +1 is for the count byte
            if i + 1 + rjumpv_additional_immediates >= code.len() {
                println!("Malformed code: immediate out of bounds");
                break;
            }

            for table_index in 0..count {
                let offset =
                    unsafe { read_i16(code.as_ptr().add(i + 2 + 2 * table_index)) } as isize;
                println!("RJUMPV[{table_index}]: 0x{offset:04X} ({offset})");
            }
        }

        i += 1 + opcode.immediate_size() as usize + rjumpv_additional_immediates;
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::hex;

    #[test]
    fn sanity_print() {
        super::print(&hex!("60015e01fffc00"));
        super::print(&hex!("60016008b000015000"));
    }
}
