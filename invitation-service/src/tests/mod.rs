mod invitation_handlers_test;
mod support;
