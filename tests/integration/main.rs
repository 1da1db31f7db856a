mod helpers;
mod line_editing;
mod sessions;
mod telnet;
