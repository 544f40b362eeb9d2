// Structural equality of two transducers up to state renumbering.

use std::collections::VecDeque;

use crate::fst::Fst;
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{NO_STATE_ID, Result, StateId};

/// Weights are ordered by their quantized value, so weights within
/// `delta` of each other keep their original order.
fn sorted_trs<W: Semiring>(trs: &[Tr<W>], delta: f32) -> Vec<Tr<W>> {
    let mut out = trs.to_vec();
    out.sort_by(|a, b| {
        (a.ilabel, a.olabel)
            .cmp(&(b.ilabel, b.olabel))
            .then_with(|| {
                let (qa, qb) = (a.weight.quantize(delta), b.weight.quantize(delta));
                qa.value().total_cmp(&qb.value())
            })
    });
    out
}

fn weights_match<W: Semiring>(a: Option<W>, b: Option<W>, delta: f32) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.approx_equal(&y, delta),
        _ => false,
    }
}

/// Whether a bijection between the states of `a` and `b` maps start to
/// start, finals to finals and transitions to transitions with equal
/// labels. Weights are compared with `approx_equal(delta)`.
///
/// Transitions of a state are paired after sorting by
/// `(ilabel, olabel, weight quantized to delta)`; ties are paired in
/// their original order. States not
/// reachable from the start are not compared.
pub fn isomorphic<W, F1, F2>(a: &F1, b: &F2, delta: f32) -> Result<bool>
where
    W: Semiring,
    F1: Fst<W>,
    F2: Fst<W>,
{
    if a.num_states() != b.num_states() {
        return Ok(false);
    }
    let (start_a, start_b) = match (a.start(), b.start()) {
        (None, None) => return Ok(true),
        (Some(x), Some(y)) => (x, y),
        _ => return Ok(false),
    };

    let n = a.num_states();
    let mut a_to_b = vec![NO_STATE_ID; n];
    let mut b_to_a = vec![NO_STATE_ID; n];
    let mut queue: VecDeque<(StateId, StateId)> = VecDeque::new();
    a_to_b[start_a as usize] = start_b;
    b_to_a[start_b as usize] = start_a;
    queue.push_back((start_a, start_b));

    while let Some((sa, sb)) = queue.pop_front() {
        if !weights_match(a.final_weight(sa)?, b.final_weight(sb)?, delta) {
            return Ok(false);
        }
        let trs_a = sorted_trs(a.get_trs(sa)?, delta);
        let trs_b = sorted_trs(b.get_trs(sb)?, delta);
        if trs_a.len() != trs_b.len() {
            return Ok(false);
        }
        for (ta, tb) in trs_a.iter().zip(&trs_b) {
            if ta.ilabel != tb.ilabel
                || ta.olabel != tb.olabel
                || !ta.weight.approx_equal(&tb.weight, delta)
            {
                return Ok(false);
            }
            let (na, nb) = (ta.nextstate as usize, tb.nextstate as usize);
            match (a_to_b[na], b_to_a[nb]) {
                (NO_STATE_ID, NO_STATE_ID) => {
                    a_to_b[na] = tb.nextstate;
                    b_to_a[nb] = ta.nextstate;
                    queue.push_back((ta.nextstate, tb.nextstate));
                }
                (mapped, back) if mapped == tb.nextstate && back == ta.nextstate => {}
                _ => return Ok(false),
            }
        }
    }

    Ok(true)
}
