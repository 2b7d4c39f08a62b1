mod loan_handlers_test;
