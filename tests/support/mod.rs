#![allow(dead_code)]

pub mod handsign_env;
pub mod hands;
