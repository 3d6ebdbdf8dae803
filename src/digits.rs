use thiserror::Error;

/// Largest value `rotate` accepts: any value of at most nine digits rotates
/// to another value of at most nine digits. A ten digit rotation can leave
/// `u32` (1111111119 would rotate to 9111111111).
pub const MAX_ROTATABLE: u32 = 999_999_999;

/// Input outside the nine digit rotation domain.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("number must be at most {max}, got {0}", max = MAX_ROTATABLE)]
pub struct RotationDomainError(pub u32);

/// Move the last decimal digit of `n` to the front: 197 -> 719 -> 971 -> 197.
///
/// Single digit numbers rotate onto themselves. A trailing zero collapses
/// (10 -> 1), so the rotations of a number containing 0 do not form a cycle.
/// The search never rotates such numbers because `digit_filter` rejects them
/// first. Callers keep `n` at or below `MAX_ROTATABLE`; a ten digit rotation
/// does not fit `u32`.
pub fn rotate(n: u32) -> u32 {
    let rest = n / 10;
    let mut rotated = n % 10;

    let mut magnitude = rest;
    while magnitude != 0 {
        rotated *= 10;
        magnitude /= 10;
    }

    rotated + rest
}

/// The rotation cycle starting at `n`: `n` itself, then each successive
/// rotation until the cycle would return to `n`.
///
/// Capped at the digit count of `n`. A zero-free number always closes its
/// cycle within that many steps, while a number with a trailing zero never
/// returns to itself, so the cap keeps the walk finite either way.
pub fn rotation_cycle(n: u32) -> Vec<u32> {
    let max_len = digit_count(n) as usize;
    let mut cycle = Vec::with_capacity(max_len);
    cycle.push(n);

    let mut rotated = rotate(n);
    while rotated != n && cycle.len() < max_len {
        cycle.push(rotated);
        rotated = rotate(rotated);
    }

    cycle
}

/// Cheap pre-check before walking a rotation cycle. A digit from
/// {0, 2, 4, 5, 6, 8} puts some rotation of `n` at an even or
/// multiple-of-five value, so a multi-digit `n` containing one can never be
/// a circular prime. Single digit numbers always pass since their only
/// rotation is themselves.
pub fn digit_filter(n: u32) -> bool {
    if n < 10 {
        return true;
    }

    let mut rest = n;
    while rest > 0 {
        match rest % 10 {
            1 | 3 | 7 | 9 => {}
            _ => return false,
        }
        rest /= 10;
    }

    true
}

/// Trial division primality check. Slow but independent of the sieve, which
/// makes it the oracle for the `rotations` subcommand and for tests.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }

    let mut divisor: u64 = 3;
    while divisor * divisor <= n as u64 {
        if n as u64 % divisor == 0 {
            return false;
        }
        divisor += 2;
    }

    true
}

fn digit_count(mut n: u32) -> u32 {
    let mut count = 1;
    while n >= 10 {
        count += 1;
        n /= 10;
    }
    count
}

/// Print the rotation cycle of `number` with a primality verdict per member,
/// then the overall circular prime verdict. Values past `MAX_ROTATABLE` are
/// rejected before any rotation arithmetic runs.
pub fn print_rotations(number: u32) -> Result<(), RotationDomainError> {
    if number > MAX_ROTATABLE {
        return Err(RotationDomainError(number));
    }

    let cycle = rotation_cycle(number);

    println!("Rotations of {}:", number);
    for &value in &cycle {
        let verdict = if is_prime(value) { "prime" } else { "composite" };
        println!("  {:>10}  {}", value, verdict);
    }

    if digit_filter(number) {
        println!("Digit filter: pass");
    } else {
        println!("Digit filter: rejected (contains a digit from 0, 2, 4, 5, 6, 8)");
    }

    let last = cycle[cycle.len() - 1];
    let closes = rotate(last) == number;

    if closes && cycle.iter().all(|&value| is_prime(value)) {
        println!("{} is a circular prime", number);
    } else {
        println!("{} is not a circular prime", number);
    }

    Ok(())
}
