mod refresh_run;
