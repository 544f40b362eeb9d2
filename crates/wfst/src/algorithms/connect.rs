// Trim states that are not on a start-to-final path.

use log::debug;

use crate::fst::{Fst, VectorFst};
use crate::properties::{accessible_states, coaccessible_states};
use crate::semiring::Semiring;
use crate::{Result, StateId};

/// Keep only the states that are both accessible (reachable from the
/// start) and coaccessible (can reach a final state), with the
/// transitions between them. A transducer with no such state ends up with
/// no states at all. In place.
pub fn connect<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let access = accessible_states(fst)?;
    let coaccess = coaccessible_states(fst)?;
    let dead: Vec<StateId> = fst
        .states_iter()
        .filter(|&s| !(access[s as usize] && coaccess[s as usize]))
        .collect();
    if dead.is_empty() {
        return Ok(());
    }
    debug!(
        "connect: removing {} of {} states",
        dead.len(),
        fst.num_states()
    );
    if dead.len() == fst.num_states() {
        fst.del_all_states();
        return Ok(());
    }
    fst.del_states(dead)
}
