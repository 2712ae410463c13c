// Feedback engine: scoring a guess against the secret code.
//
// `score` returns the classic Mastermind pair:
// - `double`: pegs with the right colour in the right slot.
// - `single`: pegs with the right colour in the wrong slot. Computed as the
//   per-colour overlap `sum_c min(count_secret(c), count_guess(c))` minus
//   `double`, so an exact match is never also counted as a misplaced one.
//
// The overlap always includes every exact match, so the subtraction cannot
// go below zero for any duplicate pattern.
//
// Also here: the palette-cycling helpers used by `inc_rack`/`dec_rack`, and
// `random_rack` for default racks and the random-code assist.

use masternein_prng::CodeRng;
use masternein_protocol::{Colour, Palette, RACK_LEN, Rack};

/// Result of scoring one guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub single: u8,
    pub double: u8,
}

/// Score `guess` against `secret`.
pub fn score(secret: &Rack, guess: &Rack) -> Feedback {
    let double = secret
        .iter()
        .zip(guess.iter())
        .filter(|(s, g)| s == g)
        .count();

    let secret_counts = colour_counts(secret);
    let guess_counts = colour_counts(guess);
    let overlap: usize = secret_counts
        .iter()
        .zip(guess_counts.iter())
        .map(|(s, g)| usize::from(*s.min(g)))
        .sum();

    Feedback {
        single: overlap.saturating_sub(double) as u8,
        double: double as u8,
    }
}

/// True when every slot matches.
pub fn is_winning_rack(secret: &Rack, guess: &Rack) -> bool {
    usize::from(score(secret, guess).double) == RACK_LEN
}

/// Slot-by-slot equality, independent of scoring.
pub fn is_equal_rack(a: &Rack, b: &Rack) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Four colours drawn independently and uniformly from all nine.
pub fn random_rack(rng: &mut CodeRng) -> Rack {
    let mut slots = [Colour::Red; RACK_LEN];
    for slot in &mut slots {
        *slot = Colour::ALL[rng.index(Colour::ALL.len())];
    }
    Rack::new(slots)
}

/// The colour after `colour` in `palette`, wrapping to the start. A colour
/// missing from the palette maps to the first entry.
pub fn next_colour(palette: &Palette, colour: Colour) -> Colour {
    let colours = palette.colours();
    colours
        .iter()
        .position(|c| *c == colour)
        .and_then(|i| colours.get(i + 1).copied())
        .unwrap_or_else(|| palette.first())
}

/// The colour before `colour` in `palette`, wrapping to the end. A colour
/// missing from the palette maps to the last entry.
pub fn previous_colour(palette: &Palette, colour: Colour) -> Colour {
    let colours = palette.colours();
    colours
        .iter()
        .position(|c| *c == colour)
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| colours.get(i).copied())
        .unwrap_or_else(|| palette.last())
}

fn colour_counts(rack: &Rack) -> [u8; 9] {
    let mut counts = [0u8; 9];
    for colour in rack.iter() {
        counts[colour.ordinal()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use Colour::*;
    use proptest::prelude::*;

    fn rack(slots: [Colour; 4]) -> Rack {
        Rack::new(slots)
    }

    #[test]
    fn three_exact_no_misplaced() {
        let fb = score(
            &rack([Red, Green, Blue, Orange]),
            &rack([Gray, Green, Blue, Orange]),
        );
        assert_eq!(fb, Feedback { single: 0, double: 3 });
    }

    #[test]
    fn duplicates_in_guess_do_not_overcount() {
        let fb = score(
            &rack([Orange, Black, Gray, Gray]),
            &rack([Black, Black, Orange, Black]),
        );
        assert_eq!(fb, Feedback { single: 1, double: 1 });
    }

    #[test]
    fn two_exact_two_misplaced() {
        let fb = score(
            &rack([Red, Red, Blue, White]),
            &rack([Red, Blue, Red, White]),
        );
        assert_eq!(fb, Feedback { single: 2, double: 2 });
    }

    #[test]
    fn disjoint_colours_score_nothing() {
        let fb = score(
            &rack([Red, Red, Red, Red]),
            &rack([Pink, Purple, Gray, White]),
        );
        assert_eq!(fb, Feedback { single: 0, double: 0 });
    }

    #[test]
    fn winning_requires_all_four() {
        let secret = rack([Red, Green, Blue, Orange]);
        assert!(is_winning_rack(&secret, &secret));
        assert!(!is_winning_rack(&secret, &rack([Red, Green, Blue, Gray])));
        assert!(is_equal_rack(&secret, &rack([Red, Green, Blue, Orange])));
        assert!(!is_equal_rack(&secret, &rack([Orange, Blue, Green, Red])));
    }

    #[test]
    fn cycling_wraps_both_ends() {
        let p = Palette::try_from(vec![Blue, Pink, Red]).unwrap();
        assert_eq!(next_colour(&p, Blue), Pink);
        assert_eq!(next_colour(&p, Red), Blue);
        assert_eq!(previous_colour(&p, Blue), Red);
        assert_eq!(previous_colour(&p, Pink), Blue);
    }

    #[test]
    fn cycling_from_outside_palette_snaps_to_ends() {
        let p = Palette::try_from(vec![Blue, Pink, Red]).unwrap();
        assert_eq!(next_colour(&p, Gray), Blue);
        assert_eq!(previous_colour(&p, Gray), Red);
    }

    #[test]
    fn random_rack_is_reproducible_per_seed() {
        let a = random_rack(&mut CodeRng::new(5));
        let b = random_rack(&mut CodeRng::new(5));
        assert_eq!(a, b);
    }

    fn any_colour() -> impl Strategy<Value = Colour> {
        (0..Colour::ALL.len()).prop_map(|i| Colour::ALL[i])
    }

    fn any_rack() -> impl Strategy<Value = Rack> {
        proptest::array::uniform4(any_colour()).prop_map(Rack::new)
    }

    proptest! {
        #[test]
        fn self_score_is_four_exact(r in any_rack()) {
            prop_assert_eq!(score(&r, &r), Feedback { single: 0, double: 4 });
            prop_assert!(is_winning_rack(&r, &r));
        }

        #[test]
        fn score_is_bounded(secret in any_rack(), guess in any_rack()) {
            let fb = score(&secret, &guess);
            prop_assert!(fb.double <= 4);
            prop_assert!(fb.single + fb.double <= 4);
        }

        #[test]
        fn score_is_symmetric(a in any_rack(), b in any_rack()) {
            prop_assert_eq!(score(&a, &b), score(&b, &a));
        }

        #[test]
        fn winning_matches_equality(a in any_rack(), b in any_rack()) {
            prop_assert_eq!(is_winning_rack(&a, &b), is_equal_rack(&a, &b));
        }

        #[test]
        fn cycling_stays_in_palette(c in any_colour()) {
            let p = Palette::try_from(vec![Colour::Green, Colour::White]).unwrap();
            prop_assert!(p.contains(next_colour(&p, c)));
            prop_assert!(p.contains(previous_colour(&p, c)));
        }
    }
}
