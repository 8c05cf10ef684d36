// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use log::trace;
use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                        abcdefghijklmnopqrstuvwxyz\
                        0123456789\
                        !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Samples `length` characters from ASCII letters, digits and punctuation.
pub(crate) fn generate_random_password(length: usize) -> String {
    trace!("Generating random password");

    let mut rng = rand::rng();
    let password: String = (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();
    password
}
