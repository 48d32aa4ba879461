#![allow(dead_code)]

pub mod command;

pub const OLD_TEXT: &str = "a\nb\nc\n";
pub const NEW_TEXT: &str = "a\nx\nc\n";
pub const OLD_TEXT_OID: &str = "de980441c3ab03a8c07dda1ad27b8a11f39deb1e";
pub const NEW_TEXT_OID: &str = "f5aa8c164c717c24b1f0816740c92121332f7797";
