// Suggest corrections for a word by composing it with an edit-distance
// transducer and a lexicon, then taking the n best outputs.
//
// Run: cargo run -p wfst --example spell_suggest -- trnasducer

use wfst::prelude::*;

type W = TropicalWeight;

const LEXICON: &[&str] = &[
    "transducer", "transducers", "transition", "translate", "acceptor",
    "automaton", "automata", "compose", "composition", "determinize",
    "minimize", "epsilon", "semiring", "weight", "shortest", "path",
];

fn letters(word: &str) -> Vec<Label> {
    word.bytes().map(Label::from).collect()
}

/// One-state transducer over `a..=z`: copying a letter is free, every
/// substitution, insertion and deletion costs 1.
fn edit_transducer() -> Result<VectorFst<W>> {
    let mut fst = VectorFst::new();
    let s = fst.add_state();
    fst.set_start(s)?;
    fst.set_final(s, W::one())?;
    for a in b'a'..=b'z' {
        let a = Label::from(a);
        fst.add_tr(s, Tr::new(a, 0, 1.0, s))?;
        fst.add_tr(s, Tr::new(0, a, 1.0, s))?;
        for b in b'a'..=b'z' {
            let b = Label::from(b);
            let cost = if a == b { 0.0 } else { 1.0 };
            fst.add_tr(s, Tr::new(a, b, cost, s))?;
        }
    }
    Ok(fst)
}

fn lexicon() -> Result<VectorFst<W>> {
    let words: Vec<VectorFst<W>> = LEXICON
        .iter()
        .map(|w| acceptor(&letters(w), W::one()))
        .collect();
    let mut fst = union_list(&words)?;
    optimize(&mut fst)?;
    tr_sort(&mut fst, true);
    Ok(fst)
}

fn main() -> Result<()> {
    let word = std::env::args().nth(1).unwrap_or_else(|| "trnasducer".to_string());
    let input = acceptor(&letters(&word.to_lowercase()), W::one());

    let mut edit = edit_transducer()?;
    tr_sort(&mut edit, true);
    let lattice = compose(&input, &edit)?;
    let mut lattice = compose(&lattice, &lexicon()?)?;
    project(&mut lattice, ProjectType::Output);
    rm_epsilon(&mut lattice)?;

    let config = ShortestPathConfig {
        nshortest: 3,
        unique: true,
        ..ShortestPathConfig::default()
    };
    let best = shortest_path_with_config(&lattice, config)?;
    let mut suggestions: Vec<(String, f32)> = best
        .paths_iter()
        .map(|p| {
            let text = p.olabels.iter().filter_map(|&l| char::from_u32(l)).collect();
            (text, p.weight.value())
        })
        .collect();
    suggestions.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    println!("{word}:");
    for (text, cost) in suggestions {
        println!("  {text}\t{cost}");
    }
    Ok(())
}
