//! Validation pipeline for EOF containers.
//!
//! The pipeline is a pure function of `(revision, bytes)`: prefix and
//! version gate, header and type-section parsing, then per code section an
//! instruction scan, a relative-jump destination check and a stack-height
//! data-flow pass. Sub-container sections re-enter the same pipeline.

use super::{eof_version, is_eof_container, CodeInfo, EofHeader, EofValidationError};
use crate::{
    opcode::{self, OPCODE_INFO},
    spec::SpecId,
    utils::{read_i16, read_u16},
};
use std::{vec, vec::Vec};

/// Sub-containers nesting deeper than this are rejected.
///
/// The format itself bounds nesting only through section sizes; the cap is
/// defensive.
pub const CONTAINER_SECTION_DEPTH_LIMIT: usize = 1024;

/// Stack height of a byte not yet reached by the data-flow pass.
const HEIGHT_UNSET: i32 = -1;
/// Stack height marker for immediate bytes, which are not instruction starts.
const HEIGHT_IMMEDIATE: i32 = -2;

/// Validates an EOF container under the given revision.
///
/// On success returns the parsed [`EofHeader`] of the outermost container.
/// The first error encountered anywhere in the pipeline is returned and no
/// partial output is produced.
pub fn validate_eof(spec: SpecId, container: &[u8]) -> Result<EofHeader, EofValidationError> {
    let header = validate_container(spec, container)?;

    // Sub-containers re-enter the pipeline. An explicit stack keeps the
    // nesting depth off the call stack.
    let mut containers: Vec<(&[u8], usize)> = Vec::with_capacity(4);
    push_sub_containers(&mut containers, container, &header, 1);
    while let Some((sub_container, depth)) = containers.pop() {
        if depth > CONTAINER_SECTION_DEPTH_LIMIT {
            return Err(EofValidationError::ContainerNestingTooDeep);
        }
        let sub_header = validate_container(spec, sub_container)?;
        push_sub_containers(&mut containers, sub_container, &sub_header, depth + 1);
    }

    Ok(header)
}

/// Validates a single container, not descending into its sub-containers.
fn validate_container(spec: SpecId, container: &[u8]) -> Result<EofHeader, EofValidationError> {
    if !is_eof_container(container) {
        return Err(EofValidationError::InvalidPrefix);
    }
    if eof_version(container) != 1 {
        return Err(EofValidationError::EofVersionUnknown);
    }
    // EOF v1 exists from Cancun on.
    if !spec.is_enabled_in(SpecId::CANCUN) {
        return Err(EofValidationError::EofVersionUnknown);
    }

    let header = EofHeader::parse(container)?;
    for index in 0..header.code_sizes.len() {
        let code = &container[header.code_begin(index)..header.code_end(index)];
        validate_instructions(spec, code)?;
        validate_rjump_destinations(code)?;
        let max_stack_height = validate_max_stack_height(code, index, &header.types)?;
        if max_stack_height != header.types[index].max_stack_height as i32 {
            return Err(EofValidationError::InvalidMaxStackHeight);
        }
    }
    Ok(header)
}

fn push_sub_containers<'a>(
    stack: &mut Vec<(&'a [u8], usize)>,
    container: &'a [u8],
    header: &EofHeader,
    depth: usize,
) {
    // Pushed in reverse: popping then visits siblings in index order, with a
    // container's descendants drained before its next sibling, so the first
    // error in container order is the one reported.
    for index in (0..header.container_sizes.len()).rev() {
        stack.push((
            &container[header.container_begin(index)..header.container_end(index)],
            depth,
        ));
    }
}

/// Checks that the code consists of defined instructions only and that every
/// declared immediate is present.
fn validate_instructions(spec: SpecId, code: &[u8]) -> Result<(), EofValidationError> {
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        let Some(info) = &OPCODE_INFO[op as usize] else {
            return Err(EofValidationError::UndefinedInstruction);
        };
        if !info.is_defined_in(spec) {
            return Err(EofValidationError::UndefinedInstruction);
        }

        if op == opcode::RJUMPV {
            // The jump-table length is carried in the code itself.
            if i + 1 >= code.len() {
                return Err(EofValidationError::TruncatedInstruction);
            }
            let count = code[i + 1] as usize;
            if count < 1 {
                return Err(EofValidationError::InvalidRjumpvCount);
            }
            i += 1 + count * 2;
        } else {
            i += info.immediate_size() as usize;
        }

        if i >= code.len() {
            return Err(EofValidationError::TruncatedInstruction);
        }
        i += 1;
    }
    Ok(())
}

/// Checks that every relative-jump destination is inside the code section
/// and is an instruction start.
fn validate_rjump_destinations(code: &[u8]) -> Result<(), EofValidationError> {
    let mut rjumpdests = Vec::new();
    let mut immediate_map = vec![false; code.len()];
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        let Some(info) = &OPCODE_INFO[op as usize] else {
            // The instruction scan has already rejected undefined opcodes.
            return Err(EofValidationError::Impossible);
        };

        if op == opcode::RJUMP || op == opcode::RJUMPI {
            // SAFETY: Immediate presence is checked by the instruction scan.
            let offset = unsafe { read_i16(code.as_ptr().add(i + 1)) } as i32;
            let dest = i as i32 + 3 + offset;
            if dest < 0 || dest >= code.len() as i32 {
                return Err(EofValidationError::InvalidRjumpDestination);
            }
            rjumpdests.push(dest as usize);
        } else if op == opcode::RJUMPV {
            let count = code[i + 1] as usize;
            // Destinations are relative to the byte after the jump table.
            let post = i as i32 + 2 + 2 * count as i32;
            for k in 0..count {
                // SAFETY: Table presence is checked by the instruction scan.
                let offset = unsafe { read_i16(code.as_ptr().add(i + 2 + 2 * k)) } as i32;
                let dest = post + offset;
                if dest < 0 || dest >= code.len() as i32 {
                    return Err(EofValidationError::InvalidRjumpDestination);
                }
                rjumpdests.push(dest as usize);
            }
            let immediates = 1 + count * 2;
            immediate_map[i + 1..i + 1 + immediates].fill(true);
            i += immediates + 1;
            continue;
        }

        let immediates = info.immediate_size() as usize;
        immediate_map[i + 1..i + 1 + immediates].fill(true);
        i += immediates + 1;
    }

    // Check collected destinations against the immediate positions.
    for dest in rjumpdests {
        if immediate_map[dest] {
            return Err(EofValidationError::InvalidRjumpDestination);
        }
    }
    Ok(())
}

/// Computes the maximum operand-stack height of the code section by abstract
/// interpretation from the declared input arity.
///
/// Heights are tracked per byte; a worklist drains all paths and every merge
/// point must be reached with a single height.
fn validate_max_stack_height(
    code: &[u8],
    this_section: usize,
    types: &[CodeInfo],
) -> Result<i32, EofValidationError> {
    let this_types = &types[this_section];

    let mut stack_heights = vec![HEIGHT_UNSET; code.len()];
    let mut worklist: Vec<usize> = Vec::with_capacity(16);
    let mut successors: Vec<usize> = Vec::new();

    stack_heights[0] = this_types.inputs as i32;
    worklist.push(0);

    while let Some(i) = worklist.pop() {
        let op = code[i];
        let Some(info) = &OPCODE_INFO[op as usize] else {
            // The instruction scan has already rejected undefined opcodes.
            return Err(EofValidationError::Impossible);
        };

        let mut stack_in = info.inputs() as i32;
        let mut stack_diff = info.io_diff() as i32;

        if op == opcode::CALLF {
            // SAFETY: Immediate presence is checked by the instruction scan.
            let section = unsafe { read_u16(code.as_ptr().add(i + 1)) } as usize;
            let Some(target_types) = types.get(section) else {
                return Err(EofValidationError::InvalidCodeSectionIndex);
            };
            // The callee signature dictates the stack requirement.
            stack_in = target_types.inputs as i32;
            stack_diff = target_types.io_diff();
        }

        let stack_height = stack_heights[i];
        if stack_height < stack_in {
            return Err(EofValidationError::StackUnderflow);
        }

        successors.clear();

        // The RJUMPV immediate length depends on the code; it is handled
        // below together with its jump table.
        if op != opcode::RJUMP && op != opcode::RJUMPV && !info.is_terminating() {
            let next = i + info.immediate_size() as usize + 1;
            if next >= code.len() {
                return Err(EofValidationError::NoTerminatingInstruction);
            }
            successors.push(next);
        }

        if op == opcode::RJUMP || op == opcode::RJUMPI {
            // SAFETY: Immediate presence is checked by the instruction scan.
            let offset = unsafe { read_i16(code.as_ptr().add(i + 1)) } as i32;
            // In bounds; checked by the destination pass.
            successors.push((i as i32 + 3 + offset) as usize);
        }

        if op == opcode::RJUMPV {
            let count = code[i + 1] as usize;
            let next = i + 2 * count + 2;
            if next >= code.len() {
                return Err(EofValidationError::NoTerminatingInstruction);
            }
            stack_heights[i + 1..=i + 1 + 2 * count].fill(HEIGHT_IMMEDIATE);
            successors.push(next);
            for k in 0..count {
                // SAFETY: Table presence is checked by the instruction scan.
                let offset = unsafe { read_i16(code.as_ptr().add(i + 2 + 2 * k)) } as i32;
                // In bounds; checked by the destination pass.
                successors.push((i as i32 + 2 * count as i32 + 2 + offset) as usize);
            }
        } else {
            let immediates = info.immediate_size() as usize;
            stack_heights[i + 1..i + 1 + immediates].fill(HEIGHT_IMMEDIATE);
        }

        let next_height = stack_height + stack_diff;

        for &successor in &successors {
            if stack_heights[successor] == HEIGHT_UNSET {
                stack_heights[successor] = next_height;
                worklist.push(successor);
            } else if stack_heights[successor] != next_height {
                return Err(EofValidationError::StackHeightMismatch);
            }
        }

        if op == opcode::RETF && next_height != this_types.outputs as i32 {
            return Err(EofValidationError::NonEmptyStackOnTerminatingInstruction);
        }
    }

    if stack_heights.contains(&HEIGHT_UNSET) {
        return Err(EofValidationError::UnreachableInstructions);
    }

    stack_heights
        .iter()
        .max()
        .copied()
        .ok_or(EofValidationError::Impossible)
}
