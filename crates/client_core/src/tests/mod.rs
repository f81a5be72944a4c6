mod session_tests;
